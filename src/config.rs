//! Deployment configuration
//!
//! Everything has a working default for the reference install; any value can
//! be overridden with a `TRAILCAM_*` environment variable:
//!
//! | Variable | Default |
//! |---|---|
//! | `TRAILCAM_OUTPUT_DIR` | `/home/pi/Projects/TrailCam/captures` |
//! | `TRAILCAM_SERIAL_DEVICE` | `/dev/ttyS0` |
//! | `TRAILCAM_STILL_COUNT` | `3` |
//! | `TRAILCAM_VIDEO_SECS` | `10` |
//! | `TRAILCAM_REARM_WINDOW_SECS` | `120` |
//! | `TRAILCAM_OVERLAY_POLL_MS` | `200` |
//! | `TRAILCAM_I2C_BUS` | `1` |
//! | `TRAILCAM_SENSOR_ADDRESS` | `0x76` |
//! | `TRAILCAM_TRANSCODER` | `MP4Box` |
//! | `TRAILCAM_STRICT_TRANSCODE` | `0` |
//! | `TRAILCAM_POWER_OFF` | `0` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::capture::{CameraSettings, SensorSettings};
use crate::error::{Error, Result};
use crate::finalize::TranscoderSettings;
use crate::rearm::MAX_REARM_WINDOW;
use crate::serial::SerialSettings;

pub const DEFAULT_OUTPUT_DIR: &str = "/home/pi/Projects/TrailCam/captures";

#[derive(Debug, Clone)]
pub struct TrailCamConfig {
    /// Directory receiving stills and videos
    pub output_dir: PathBuf,
    /// Stills taken at startup
    pub still_count: u32,
    /// Length of each video cycle
    pub video_duration: Duration,
    /// Inactivity window before the loop expires
    pub rearm_window: Duration,
    pub camera: CameraSettings,
    pub sensor: SensorSettings,
    pub serial: SerialSettings,
    pub transcoder: TranscoderSettings,
    /// Shut the host down when the loop expires
    pub power_off: bool,
    /// Simulated camera, fixed sensor and stdin motion source
    pub test_source: bool,
}

impl Default for TrailCamConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            still_count: 3,
            video_duration: Duration::from_secs(10),
            rearm_window: Duration::from_secs(120),
            camera: CameraSettings::default(),
            sensor: SensorSettings::default(),
            serial: SerialSettings::default(),
            transcoder: TranscoderSettings::default(),
            power_off: false,
            test_source: false,
        }
    }
}

impl TrailCamConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("TRAILCAM_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(device) = lookup("TRAILCAM_SERIAL_DEVICE") {
            config.serial.device = device;
        }
        if let Some(count) = parse_var::<u32>(&lookup, "TRAILCAM_STILL_COUNT")? {
            config.still_count = count;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TRAILCAM_VIDEO_SECS")? {
            config.video_duration = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TRAILCAM_REARM_WINDOW_SECS")? {
            if secs > MAX_REARM_WINDOW.as_secs() {
                return Err(Error::Config(format!(
                    "TRAILCAM_REARM_WINDOW_SECS must be at most {}",
                    MAX_REARM_WINDOW.as_secs()
                )));
            }
            config.rearm_window = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "TRAILCAM_OVERLAY_POLL_MS")? {
            if ms == 0 {
                return Err(Error::Config(
                    "TRAILCAM_OVERLAY_POLL_MS must be greater than zero".to_string(),
                ));
            }
            config.camera.overlay_refresh_interval = Duration::from_millis(ms);
        }
        if let Some(bus) = parse_var::<u8>(&lookup, "TRAILCAM_I2C_BUS")? {
            config.sensor.i2c_bus = bus;
        }
        if let Some(raw) = lookup("TRAILCAM_SENSOR_ADDRESS") {
            config.sensor.address = parse_address(&raw)?;
        }
        if let Some(program) = lookup("TRAILCAM_TRANSCODER") {
            config.transcoder.program = program;
        }
        if let Some(strict) = parse_flag(&lookup, "TRAILCAM_STRICT_TRANSCODE")? {
            config.transcoder.strict = strict;
        }
        if let Some(power_off) = parse_flag(&lookup, "TRAILCAM_POWER_OFF")? {
            config.power_off = power_off;
        }

        Ok(config)
    }

    /// Apply command line switches on top of the environment
    pub fn apply_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            match arg.as_ref() {
                "--test-source" => self.test_source = true,
                "--power-off" => self.power_off = true,
                _ => {}
            }
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}={:?}: {}", key, raw, e))),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    match lookup(key).as_deref().map(str::trim) {
        None => Ok(None),
        Some("1") | Some("true") | Some("yes") => Ok(Some(true)),
        Some("0") | Some("false") | Some("no") | Some("") => Ok(Some(false)),
        Some(other) => Err(Error::Config(format!(
            "{}={:?}: expected 0 or 1",
            key, other
        ))),
    }
}

/// I2C address in decimal or `0x` hex
fn parse_address(raw: &str) -> Result<u16> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| Error::Config(format!("TRAILCAM_SENSOR_ADDRESS={:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = TrailCamConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.still_count, 3);
        assert_eq!(config.video_duration, Duration::from_secs(10));
        assert_eq!(config.rearm_window, Duration::from_secs(120));
        assert_eq!(config.serial.device, "/dev/ttyS0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.sensor.address, 0x76);
        assert_eq!(config.transcoder.program, "MP4Box");
        assert!(!config.power_off);
        assert!(!config.test_source);
    }

    #[test]
    fn test_environment_overrides() {
        let config = TrailCamConfig::from_lookup(lookup(&[
            ("TRAILCAM_OUTPUT_DIR", "/tmp/captures"),
            ("TRAILCAM_STILL_COUNT", "5"),
            ("TRAILCAM_VIDEO_SECS", "30"),
            ("TRAILCAM_OVERLAY_POLL_MS", "500"),
            ("TRAILCAM_SENSOR_ADDRESS", "0x77"),
            ("TRAILCAM_STRICT_TRANSCODE", "1"),
        ]))
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/tmp/captures"));
        assert_eq!(config.still_count, 5);
        assert_eq!(config.video_duration, Duration::from_secs(30));
        assert_eq!(
            config.camera.overlay_refresh_interval,
            Duration::from_millis(500)
        );
        assert_eq!(config.sensor.address, 0x77);
        assert!(config.transcoder.strict);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for vars in [
            [("TRAILCAM_STILL_COUNT", "three")],
            [("TRAILCAM_OVERLAY_POLL_MS", "0")],
            [("TRAILCAM_SENSOR_ADDRESS", "0xZZ")],
            [("TRAILCAM_POWER_OFF", "maybe")],
            [("TRAILCAM_REARM_WINDOW_SECS", "18446744073709551615")],
        ] {
            let err = TrailCamConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{:?}", vars);
        }
    }

    #[test]
    fn test_rearm_window_upper_bound() {
        let max = MAX_REARM_WINDOW.as_secs().to_string();
        let config =
            TrailCamConfig::from_lookup(lookup(&[("TRAILCAM_REARM_WINDOW_SECS", max.as_str())]))
                .unwrap();
        assert_eq!(config.rearm_window, MAX_REARM_WINDOW);

        let over = (MAX_REARM_WINDOW.as_secs() + 1).to_string();
        assert!(matches!(
            TrailCamConfig::from_lookup(lookup(&[("TRAILCAM_REARM_WINDOW_SECS", over.as_str())])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_args_enable_switches() {
        let mut config = TrailCamConfig::default();
        config.apply_args(["trailcam", "--test-source", "--power-off"]);
        assert!(config.test_source);
        assert!(config.power_off);
    }
}
