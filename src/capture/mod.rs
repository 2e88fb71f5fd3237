//! Capture module for stills, video and environmental telemetry
//!
//! - Camera interface and the libcamera (Pi) backend
//! - Simulated camera for development without hardware
//! - BME280 environmental readings shown in the overlay
//! - [`AnnotatedCapture`], which applies the overlay and runs one capture

pub mod camera;
pub mod libcamera;
pub mod overlay;
pub mod simulated;
pub mod telemetry;

pub use camera::{Camera, CameraSettings, Resolution};
pub use libcamera::LibcameraCamera;
pub use simulated::{CameraEvent, CameraLog, SimulatedCamera};
pub use telemetry::{
    Bme280, EnvironmentSensor, EnvironmentalSample, FixedSensor, SensorReading, SensorSettings,
};

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::Result;

/// What a capture should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Still,
    Video { duration: Duration },
}

/// A single capture request, consumed immediately
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureJob {
    pub kind: CaptureKind,
    pub output: PathBuf,
}

impl CaptureJob {
    pub fn still(output: impl Into<PathBuf>) -> Self {
        Self {
            kind: CaptureKind::Still,
            output: output.into(),
        }
    }

    pub fn video(output: impl Into<PathBuf>, duration: Duration) -> Self {
        Self {
            kind: CaptureKind::Video { duration },
            output: output.into(),
        }
    }
}

/// Camera wrapper that burns the timestamp and environment into footage
pub struct AnnotatedCapture<'a> {
    camera: &'a mut dyn Camera,
    clock: &'a dyn Clock,
    settings: &'a CameraSettings,
    sample: &'a EnvironmentalSample,
}

impl<'a> AnnotatedCapture<'a> {
    pub fn new(
        camera: &'a mut dyn Camera,
        clock: &'a dyn Clock,
        settings: &'a CameraSettings,
        sample: &'a EnvironmentalSample,
    ) -> Self {
        Self {
            camera,
            clock,
            settings,
            sample,
        }
    }

    /// Run a job, returning the recorded duration for videos
    pub fn run(&mut self, job: &CaptureJob) -> Result<Option<Duration>> {
        match job.kind {
            CaptureKind::Still => self.capture_still(&job.output).map(|_| None),
            CaptureKind::Video { duration } => self.capture_video(&job.output, duration).map(Some),
        }
    }

    /// Take one annotated still at full sensor resolution
    pub fn capture_still(&mut self, path: &Path) -> Result<()> {
        self.camera.set_resolution(self.settings.still_resolution);
        self.camera.set_annotation(&overlay::render_now(self.sample));
        self.camera.set_rotation(self.settings.rotation);

        info!("Capturing still image as {:?}", path);
        self.camera.capture_still(path)
    }

    /// Record an annotated video of at least `duration`.
    ///
    /// The overlay is re-applied every refresh interval, but its timestamp is
    /// the one taken when recording started. Returns the elapsed time between
    /// start and stop, which overshoots `duration` by at most one interval.
    pub fn capture_video(&mut self, path: &Path, duration: Duration) -> Result<Duration> {
        self.camera.set_rotation(self.settings.rotation);
        self.camera.set_resolution(self.settings.video_resolution);

        let started = self.clock.now();
        let text = overlay::render_now(self.sample);
        self.camera.set_annotation(&text);

        info!(
            "Capturing {} second video as {:?}",
            duration.as_secs_f32(),
            path
        );
        self.camera.start_recording(path)?;

        let waited = self.wait_for(started, duration, &text);
        if let Err(e) = waited {
            // Leave the camera idle before reporting the fault
            let _ = self.camera.stop_recording();
            return Err(e);
        }

        let elapsed = self.clock.now().duration_since(started);
        self.camera.stop_recording()?;
        debug!("Recorded {:?} into {:?}", elapsed, path);
        Ok(elapsed)
    }

    fn wait_for(&mut self, started: std::time::Instant, duration: Duration, text: &str) -> Result<()> {
        while self.clock.now().duration_since(started) < duration {
            self.camera.set_annotation(text);
            self.camera
                .wait_recording(self.settings.overlay_refresh_interval)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Local;
    use std::rc::Rc;
    use tempfile::tempdir;

    fn sample() -> EnvironmentalSample {
        EnvironmentalSample {
            temperature: 12.5,
            humidity: 71.0,
            taken_at: Local::now(),
        }
    }

    #[test]
    fn test_video_duration_within_one_refresh_interval() {
        let dir = tempdir().unwrap();
        let settings = CameraSettings::default();
        let sample = sample();

        for (secs, refresh_ms) in [(10u64, 200u64), (1, 200), (3, 300), (2, 700)] {
            let clock = Rc::new(ManualClock::new());
            let mut camera = SimulatedCamera::new(clock.clone());
            let settings = CameraSettings {
                overlay_refresh_interval: Duration::from_millis(refresh_ms),
                ..settings.clone()
            };
            let mut capture = AnnotatedCapture::new(&mut camera, &*clock, &settings, &sample);

            let requested = Duration::from_secs(secs);
            let elapsed = capture
                .capture_video(&dir.path().join(format!("VIDEO{}.h264", secs)), requested)
                .unwrap();

            assert!(elapsed >= requested, "{:?} < {:?}", elapsed, requested);
            assert!(
                elapsed <= requested + settings.overlay_refresh_interval,
                "{:?} overshoots {:?}",
                elapsed,
                requested
            );
        }
    }

    #[test]
    fn test_video_overlay_timestamp_fixed_at_start() {
        let dir = tempdir().unwrap();
        let clock = Rc::new(ManualClock::new());
        let mut camera = SimulatedCamera::new(clock.clone());
        let log = camera.log();
        let settings = CameraSettings::default();
        let sample = sample();

        AnnotatedCapture::new(&mut camera, &*clock, &settings, &sample)
            .capture_video(&dir.path().join("VIDEO1.h264"), Duration::from_secs(10))
            .unwrap();

        let events = log.borrow();
        let started = match &events[0] {
            CameraEvent::RecordingStarted {
                annotation,
                resolution,
                rotation,
                ..
            } => {
                assert_eq!(*resolution, Resolution::VIDEO);
                assert_eq!(*rotation, 180);
                annotation.clone()
            }
            other => panic!("unexpected first event: {:?}", other),
        };
        assert!(started.contains("Temp: 12.5C   Humidity: 71.0% "));

        let refreshes: Vec<&String> = events
            .iter()
            .filter_map(|e| match e {
                CameraEvent::AnnotationRefreshed(text) => Some(text),
                _ => None,
            })
            .collect();
        // 10s at 200ms
        assert_eq!(refreshes.len(), 50);
        assert!(refreshes.iter().all(|text| **text == started));
    }

    #[test]
    fn test_still_uses_still_mode() {
        let dir = tempdir().unwrap();
        let clock = Rc::new(ManualClock::new());
        let mut camera = SimulatedCamera::new(clock.clone());
        let log = camera.log();
        let settings = CameraSettings::default();
        let sample = sample();

        let path = dir.path().join("IMAGE1.jpg");
        AnnotatedCapture::new(&mut camera, &*clock, &settings, &sample)
            .run(&CaptureJob::still(&path))
            .unwrap();

        assert!(path.exists());
        let events = log.borrow();
        assert_eq!(events.len(), 1);
        match &events[0] {
            CameraEvent::Still {
                resolution,
                rotation,
                annotation,
                ..
            } => {
                assert_eq!(*resolution, Resolution::STILL);
                assert_eq!(*rotation, 180);
                assert!(annotation.starts_with("Date: "));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
