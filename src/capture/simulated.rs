//! Hardware-free camera
//!
//! Writes small placeholder files instead of real footage and records every
//! call it receives. Time passes through the shared [`Clock`], so with a
//! [`crate::clock::ManualClock`] a ten second recording completes instantly.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::camera::{Camera, Resolution};
use crate::clock::Clock;
use crate::error::{Error, Result};

/// JPEG start and end of image markers
const PLACEHOLDER_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xD9];
/// H.264 Annex B start code followed by an access unit delimiter
const PLACEHOLDER_H264: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x09, 0xF0];

/// Something the simulated camera was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum CameraEvent {
    Still {
        path: PathBuf,
        resolution: Resolution,
        rotation: u32,
        annotation: String,
    },
    RecordingStarted {
        path: PathBuf,
        resolution: Resolution,
        rotation: u32,
        annotation: String,
    },
    AnnotationRefreshed(String),
    RecordingStopped {
        path: PathBuf,
        elapsed: Duration,
    },
}

/// Shared view of the events a [`SimulatedCamera`] has seen
pub type CameraLog = Rc<RefCell<Vec<CameraEvent>>>;

pub struct SimulatedCamera {
    clock: Rc<dyn Clock>,
    resolution: Resolution,
    rotation: u32,
    annotation: String,
    recording: Option<(PathBuf, Instant)>,
    log: CameraLog,
}

impl SimulatedCamera {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            resolution: Resolution::VIDEO,
            rotation: 0,
            annotation: String::new(),
            recording: None,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Handle that stays readable after the camera is moved into a session
    pub fn log(&self) -> CameraLog {
        Rc::clone(&self.log)
    }

    fn record(&self, event: CameraEvent) {
        self.log.borrow_mut().push(event);
    }

    fn write_placeholder(path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents).map_err(|e| Error::filesystem(path, e))
    }
}

impl Camera for SimulatedCamera {
    fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    fn set_rotation(&mut self, degrees: u32) {
        self.rotation = degrees;
    }

    fn set_annotation(&mut self, text: &str) {
        self.annotation = text.to_string();
        if self.recording.is_some() {
            self.record(CameraEvent::AnnotationRefreshed(self.annotation.clone()));
        }
    }

    fn capture_still(&mut self, path: &Path) -> Result<()> {
        debug!("Simulated still: {:?}", path);
        Self::write_placeholder(path, PLACEHOLDER_JPEG)?;
        self.record(CameraEvent::Still {
            path: path.to_path_buf(),
            resolution: self.resolution,
            rotation: self.rotation,
            annotation: self.annotation.clone(),
        });
        Ok(())
    }

    fn start_recording(&mut self, path: &Path) -> Result<()> {
        if self.recording.is_some() {
            return Err(Error::Camera("recording already in progress".to_string()));
        }
        debug!("Simulated recording: {:?}", path);
        Self::write_placeholder(path, PLACEHOLDER_H264)?;
        self.recording = Some((path.to_path_buf(), self.clock.now()));
        self.record(CameraEvent::RecordingStarted {
            path: path.to_path_buf(),
            resolution: self.resolution,
            rotation: self.rotation,
            annotation: self.annotation.clone(),
        });
        Ok(())
    }

    fn wait_recording(&mut self, timeout: Duration) -> Result<()> {
        if self.recording.is_none() {
            return Err(Error::Camera("not recording".to_string()));
        }
        self.clock.sleep(timeout);
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        let (path, started) = self
            .recording
            .take()
            .ok_or_else(|| Error::Camera("not recording".to_string()))?;
        let elapsed = self.clock.now().duration_since(started);
        self.record(CameraEvent::RecordingStopped { path, elapsed });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tempfile::tempdir;

    #[test]
    fn test_recording_tracks_virtual_time() {
        let dir = tempdir().unwrap();
        let clock = Rc::new(ManualClock::new());
        let mut camera = SimulatedCamera::new(clock.clone());
        let log = camera.log();

        let path = dir.path().join("VIDEO1.h264");
        camera.start_recording(&path).unwrap();
        camera.wait_recording(Duration::from_secs(2)).unwrap();
        camera.stop_recording().unwrap();

        assert!(path.exists());
        assert_eq!(
            log.borrow().last(),
            Some(&CameraEvent::RecordingStopped {
                path,
                elapsed: Duration::from_secs(2),
            })
        );
    }

    #[test]
    fn test_double_start_is_rejected() {
        let dir = tempdir().unwrap();
        let mut camera = SimulatedCamera::new(Rc::new(ManualClock::new()));
        camera.start_recording(&dir.path().join("a.h264")).unwrap();
        assert!(camera.start_recording(&dir.path().join("b.h264")).is_err());
    }
}
