//! TrailCam Sensor Dump
//!
//! Takes one BME280 reading and prints it, field by field and as JSON.
//!
//! ## Usage
//!
//! ```bash
//! trailcam-sensor
//!
//! # Sensor on the secondary address
//! TRAILCAM_SENSOR_ADDRESS=0x77 trailcam-sensor
//! ```

use anyhow::{Context, Result};
use trailcam::{Bme280, EnvironmentSensor, EnvironmentalSample, TrailCamConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trailcam=info".parse().unwrap()),
        )
        .init();

    let config = TrailCamConfig::from_env().context("Invalid TRAILCAM_* configuration")?;

    let mut sensor = Bme280::open(&config.sensor).with_context(|| {
        format!(
            "Failed to open BME280 at 0x{:02x} on I2C bus {}",
            config.sensor.address, config.sensor.i2c_bus
        )
    })?;
    let reading = sensor.sample().context("Failed to read BME280")?;

    println!("timestamp:   {}", reading.timestamp);
    println!("temperature: {:.2} C", reading.temperature);
    println!("pressure:    {:.2} hPa", reading.pressure);
    println!("humidity:    {:.2} %", reading.humidity);
    println!("{}", serde_json::to_string(&reading)?);

    // The value the overlay would show
    let sample = EnvironmentalSample::from_reading(&reading);
    println!("{:.1}", sample.temperature);

    Ok(())
}
