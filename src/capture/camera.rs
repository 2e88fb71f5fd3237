//! Camera collaborator interface
//!
//! The capture logic drives the camera through [`Camera`]; the Pi backend
//! lives in [`super::libcamera`] and a hardware-free stand-in in
//! [`super::simulated`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Sensor output size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Full-sensor still mode of the v1 camera module
    pub const STILL: Self = Self::new(2592, 1944);

    /// 4:3 binned mode of the v2 camera module, suitable for video
    pub const VIDEO: Self = Self::new(1640, 1232);
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Camera settings fixed at deployment time
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Image rotation in degrees (the housing mounts the module upside down)
    pub rotation: u32,
    pub still_resolution: Resolution,
    pub video_resolution: Resolution,
    /// Overlay text height, in the picamera text size scale (6..=160)
    pub annotate_text_size: u32,
    /// Draw the overlay on a solid black band
    pub annotate_background: bool,
    /// How often the overlay is refreshed while recording
    pub overlay_refresh_interval: Duration,
    /// Exposure settle time before a still is taken
    pub still_settle: Duration,
    pub still_program: String,
    pub video_program: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            rotation: 180,
            still_resolution: Resolution::STILL,
            video_resolution: Resolution::VIDEO,
            annotate_text_size: 25,
            annotate_background: true,
            overlay_refresh_interval: Duration::from_millis(200),
            still_settle: Duration::from_millis(1000),
            still_program: "libcamera-still".to_string(),
            video_program: "libcamera-vid".to_string(),
        }
    }
}

/// Operations the capture loop needs from a camera
pub trait Camera {
    fn set_resolution(&mut self, resolution: Resolution);

    fn set_rotation(&mut self, degrees: u32);

    /// Replace the overlay text burned into subsequent frames
    fn set_annotation(&mut self, text: &str);

    /// Take one still image, returning once it is on disk
    fn capture_still(&mut self, path: &Path) -> Result<()>;

    /// Begin continuous H.264 recording into `path`
    fn start_recording(&mut self, path: &Path) -> Result<()>;

    /// Block for `timeout` while recording, failing if the recorder died
    fn wait_recording(&mut self, timeout: Duration) -> Result<()>;

    fn stop_recording(&mut self) -> Result<()>;
}
