//! TrailCam Binary
//!
//! Takes a burst of stills and a video when started by the PIR board, then
//! keeps recording while motion continues.
//!
//! ## Usage
//!
//! ```bash
//! # Run on the Pi (camera, BME280 and PIR serial link attached)
//! trailcam
//!
//! # Run without hardware; type "Motion Detected" to trigger a cycle
//! trailcam --test-source
//!
//! # Halt the Pi once the camera goes quiet
//! trailcam --power-off
//! ```

use anyhow::{Context, Result};
use std::rc::Rc;
use std::time::Duration;
use tracing::{error, info, warn};
use trailcam::{
    power_off_host, Bme280, Camera, ChannelLineSource, Clock, EnvironmentSensor, FixedSensor,
    LibcameraCamera, LineSource, SerialLineSource, SimulatedCamera, SystemClock, TrailCam,
    TrailCamConfig,
};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trailcam=info".parse().unwrap()),
        )
        .init();

    // Load configuration
    let mut config = TrailCamConfig::from_env().context("Invalid TRAILCAM_* configuration")?;
    config.apply_args(std::env::args().skip(1));

    info!("TrailCam starting");
    info!("  Output: {:?}", config.output_dir);
    info!("  Stills: {}", config.still_count);
    info!("  Video: {}s per cycle", config.video_duration.as_secs());
    info!("  Rearm window: {}s", config.rearm_window.as_secs());
    info!("  Test source: {}", config.test_source);

    let clock: Rc<dyn Clock> = Rc::new(SystemClock);

    let camera: Box<dyn Camera>;
    let mut sensor: Box<dyn EnvironmentSensor>;
    let source: Box<dyn LineSource>;

    if config.test_source {
        info!("Using simulated camera, fixed sensor and stdin motion source");
        camera = Box::new(SimulatedCamera::new(clock.clone()));
        sensor = Box::new(FixedSensor::default());
        source = Box::new(
            ChannelLineSource::stdin(config.serial.read_timeout)
                .context("Failed to start stdin reader")?,
        );
    } else {
        camera = Box::new(LibcameraCamera::new(config.camera.clone()));
        sensor = Box::new(Bme280::open(&config.sensor).context("Failed to open BME280 sensor")?);
        source = Box::new(
            SerialLineSource::open(&config.serial)
                .with_context(|| format!("Failed to open serial port {}", config.serial.device))?,
        );
    }

    let power_off = config.power_off;
    let session = TrailCam::new(config, sensor.as_mut(), camera, source, clock)
        .context("Failed to start trail camera")?;

    let report = match session.run() {
        Ok(report) => report,
        Err(e) => {
            error!("Trail camera stopped: {}", e);
            return Err(e.into());
        }
    };

    info!("Stills captured: {}", report.stills.len());
    info!("Videos captured: {}", report.videos.len());
    info!("Motion events: {}", report.rearm.motion_events);
    info!(
        "Ignored lines: {} ({} undecodable)",
        report.rearm.ignored_lines, report.rearm.undecodable_lines
    );
    if report.unconverted() > 0 {
        warn!("{} videos left unconverted", report.unconverted());
    }

    if power_off {
        // Give the log a moment to reach disk
        std::thread::sleep(Duration::from_secs(1));
        power_off_host().context("Failed to power off")?;
    }

    info!("TrailCam done");
    Ok(())
}
