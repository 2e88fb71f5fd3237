//! One trail camera run
//!
//! [`TrailCam`] owns everything the control flow touches: the camera, the
//! motion source, the clock, the output store, the finalizer and the single
//! environmental sample taken at startup. A run is
//!
//! 1. the startup still burst,
//! 2. one video cycle (record, then finalize),
//! 3. the motion rearm loop, which runs further video cycles until expiry.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::rc::Rc;
use std::time::Duration;
use tracing::{info, warn};

use crate::capture::{
    AnnotatedCapture, Camera, CameraSettings, EnvironmentSensor, EnvironmentalSample,
};
use crate::clock::Clock;
use crate::config::TrailCamConfig;
use crate::error::{Error, Result};
use crate::finalize::{FinalizeOutcome, VideoFinalizer};
use crate::rearm::{MotionRearmLoop, RearmReport};
use crate::serial::LineSource;
use crate::storage::{CaptureStore, VideoPaths};

/// One recorded and finalized video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub paths: VideoPaths,
    /// Time between recording start and stop
    pub recorded: Duration,
    pub outcome: FinalizeOutcome,
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub stills: Vec<PathBuf>,
    pub videos: Vec<VideoRecord>,
    pub rearm: RearmReport,
}

impl SessionReport {
    /// Videos whose raw stream was kept after a failed conversion
    pub fn unconverted(&self) -> usize {
        self.videos
            .iter()
            .filter(|video| !video.outcome.is_converted())
            .count()
    }
}

pub struct TrailCam {
    config: TrailCamConfig,
    store: CaptureStore,
    sample: EnvironmentalSample,
    camera: Box<dyn Camera>,
    source: Box<dyn LineSource>,
    clock: Rc<dyn Clock>,
    finalizer: VideoFinalizer,
}

impl TrailCam {
    /// Open the output directory and take the one environmental reading used
    /// for every overlay of this run
    pub fn new(
        config: TrailCamConfig,
        sensor: &mut dyn EnvironmentSensor,
        camera: Box<dyn Camera>,
        source: Box<dyn LineSource>,
        clock: Rc<dyn Clock>,
    ) -> Result<Self> {
        let store = CaptureStore::open(&config.output_dir)?;
        let sample = EnvironmentalSample::acquire(sensor)?;
        let finalizer = VideoFinalizer::new(config.transcoder.clone());

        Ok(Self {
            config,
            store,
            sample,
            camera,
            source,
            clock,
            finalizer,
        })
    }

    pub fn config(&self) -> &TrailCamConfig {
        &self.config
    }

    pub fn store(&self) -> &CaptureStore {
        &self.store
    }

    pub fn sample(&self) -> &EnvironmentalSample {
        &self.sample
    }

    /// Take the configured number of stills
    pub fn capture_stills(&mut self) -> Result<Vec<PathBuf>> {
        let mut capture = AnnotatedCapture::new(
            self.camera.as_mut(),
            self.clock.as_ref(),
            &self.config.camera,
            &self.sample,
        );

        let mut stills = Vec::with_capacity(self.config.still_count as usize);
        for _ in 0..self.config.still_count {
            let path = self.store.next_image()?;
            capture.capture_still(&path)?;
            stills.push(path);
        }
        Ok(stills)
    }

    /// Record one video and convert it
    pub fn capture_video_cycle(&mut self) -> Result<VideoRecord> {
        video_cycle(
            self.camera.as_mut(),
            self.clock.as_ref(),
            &self.config.camera,
            &self.sample,
            &self.store,
            &self.finalizer,
            self.config.video_duration,
        )
    }

    /// Stay armed, running a video cycle on each motion event until the
    /// window passes quietly
    pub fn watch(&mut self) -> Result<(RearmReport, Vec<VideoRecord>)> {
        let Self {
            config,
            store,
            sample,
            camera,
            source,
            clock,
            finalizer,
        } = self;

        let mut videos = Vec::new();
        let rearm = MotionRearmLoop::new(source.as_mut(), clock.as_ref(), config.rearm_window);
        let report = rearm.run(|| {
            let record = video_cycle(
                camera.as_mut(),
                clock.as_ref(),
                &config.camera,
                &*sample,
                &*store,
                &*finalizer,
                config.video_duration,
            )?;
            videos.push(record);
            Ok(())
        })?;

        Ok((report, videos))
    }

    /// Startup burst, first video, then the rearm loop
    pub fn run(mut self) -> Result<SessionReport> {
        info!("Capturing {} still images", self.config.still_count);
        let stills = self.capture_stills()?;

        let mut videos = vec![self.capture_video_cycle()?];

        let (rearm, more) = self.watch()?;
        videos.extend(more);

        warn!("Trail camera run finished");
        Ok(SessionReport {
            stills,
            videos,
            rearm,
        })
    }
}

fn video_cycle(
    camera: &mut dyn Camera,
    clock: &dyn Clock,
    settings: &CameraSettings,
    sample: &EnvironmentalSample,
    store: &CaptureStore,
    finalizer: &VideoFinalizer,
    duration: Duration,
) -> Result<VideoRecord> {
    let paths = store.next_video()?;
    let recorded = AnnotatedCapture::new(camera, clock, settings, sample)
        .capture_video(&paths.raw, duration)?;
    let outcome = finalizer.finalize(&paths.raw, &paths.output)?;

    Ok(VideoRecord {
        paths,
        recorded,
        outcome,
    })
}

/// `sudo shutdown -h now`
pub fn power_off_command() -> Command {
    let mut cmd = Command::new("sudo");
    cmd.args(["shutdown", "-h", "now"]).stdin(Stdio::null());
    cmd
}

/// Halt the host
pub fn power_off_host() -> Result<()> {
    warn!("Powering off");
    let status = power_off_command()
        .status()
        .map_err(|e| Error::Host(format!("failed to run shutdown: {}", e)))?;
    if !status.success() {
        return Err(Error::Host(format!("shutdown exited with {}", status)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CameraEvent, FixedSensor, SimulatedCamera};
    use crate::clock::ManualClock;
    use crate::finalize::TranscoderSettings;
    use crate::serial::ChannelLineSource;
    use std::ffi::OsStr;
    use std::sync::mpsc;
    use tempfile::tempdir;

    fn config(dir: &std::path::Path) -> TrailCamConfig {
        TrailCamConfig {
            output_dir: dir.join("captures"),
            transcoder: TranscoderSettings {
                program: "cp".to_string(),
                leading_args: Vec::new(),
                strict: false,
            },
            ..TrailCamConfig::default()
        }
    }

    #[test]
    fn test_stills_continue_existing_numbering() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        std::fs::create_dir_all(&config.output_dir).unwrap();
        std::fs::write(config.output_dir.join("IMAGE1.jpg"), b"old").unwrap();

        let clock = Rc::new(ManualClock::new());
        let camera = SimulatedCamera::new(clock.clone());
        let log = camera.log();
        let (_tx, rx) = mpsc::channel();
        let mut session = TrailCam::new(
            config,
            &mut FixedSensor::default(),
            Box::new(camera),
            Box::new(ChannelLineSource::new(rx, Duration::from_millis(1))),
            clock,
        )
        .unwrap();

        let stills = session.capture_stills().unwrap();
        let names: Vec<_> = stills
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["IMAGE2.jpg", "IMAGE3.jpg", "IMAGE4.jpg"]);
        assert_eq!(log.borrow().len(), 3);
        assert!(log
            .borrow()
            .iter()
            .all(|e| matches!(e, CameraEvent::Still { annotation, .. } if annotation.contains("Temp: 20.0C"))));
    }

    #[test]
    fn test_power_off_command() {
        let cmd = power_off_command();
        assert_eq!(cmd.get_program(), OsStr::new("sudo"));
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(args, ["shutdown", "-h", "now"].map(OsStr::new));
    }
}
