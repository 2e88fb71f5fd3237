//! Overlay text burned into stills and video

use chrono::{Local, NaiveTime};

use super::telemetry::EnvironmentalSample;

/// Time format shown in the overlay
pub const OVERLAY_TIME_FORMAT: &str = "%H:%M:%S";

/// Render the overlay for a given time of day.
pub fn render(time: NaiveTime, sample: &EnvironmentalSample) -> String {
    format!(
        "Date: {}   Temp: {:.1}C   Humidity: {:.1}% ",
        time.format(OVERLAY_TIME_FORMAT),
        sample.temperature,
        sample.humidity
    )
}

/// Render the overlay for the current local time.
pub fn render_now(sample: &EnvironmentalSample) -> String {
    render(Local::now().time(), sample)
}
