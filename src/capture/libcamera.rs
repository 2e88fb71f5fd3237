//! Pi camera backend
//!
//! Stills are taken with `libcamera-still`; recordings run as a
//! `libcamera-vid` child process writing raw H.264 to disk. The overlay is
//! drawn by libcamera's `annotate_cv` post-processing stage, configured
//! through a small JSON file rewritten whenever the text changes.

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::camera::{Camera, CameraSettings, Resolution};
use crate::error::{Error, Result};

/// How long a recorder gets to flush after SIGINT before it is killed
const STOP_GRACE: Duration = Duration::from_secs(3);

/// picamera's default text size, mapped to an `annotate_cv` scale of 1.0
const BASE_TEXT_SIZE: f64 = 32.0;

static NEXT_CAMERA_ID: AtomicUsize = AtomicUsize::new(0);

/// Handle to the Pi camera via the libcamera apps
pub struct LibcameraCamera {
    settings: CameraSettings,
    resolution: Resolution,
    rotation: u32,
    annotation: String,
    post_process_file: PathBuf,
    recorder: Option<Child>,
}

impl LibcameraCamera {
    pub fn new(settings: CameraSettings) -> Self {
        let post_process_file = std::env::temp_dir().join(format!(
            "trailcam-annotate-{}-{}.json",
            std::process::id(),
            NEXT_CAMERA_ID.fetch_add(1, Ordering::Relaxed)
        ));
        Self {
            resolution: settings.video_resolution,
            rotation: settings.rotation,
            annotation: String::new(),
            post_process_file,
            recorder: None,
            settings,
        }
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Write the `annotate_cv` stage for the current overlay text
    fn write_post_process_file(&self) -> Result<()> {
        // annotate_cv expands strftime tokens
        let text = self.annotation.replace('%', "%%");
        let scale = self.settings.annotate_text_size as f64 / BASE_TEXT_SIZE;
        let alpha = if self.settings.annotate_background { 1.0 } else { 0.0 };

        let stage = json!({
            "annotate_cv": {
                "text": text,
                "fg": 255,
                "bg": 0,
                "scale": scale,
                "thickness": 2,
                "alpha": alpha,
            }
        });

        fs::write(&self.post_process_file, stage.to_string())
            .map_err(|e| Error::filesystem(&self.post_process_file, e))
    }

    /// Arguments shared by still and video invocations
    fn common_args(&self) -> Vec<String> {
        vec![
            "--nopreview".to_string(),
            "--width".to_string(),
            self.resolution.width.to_string(),
            "--height".to_string(),
            self.resolution.height.to_string(),
            "--rotation".to_string(),
            self.rotation.to_string(),
            "--post-process-file".to_string(),
            self.post_process_file.display().to_string(),
        ]
    }

    fn still_args(&self, path: &Path) -> Vec<String> {
        let mut args = self.common_args();
        args.extend([
            "--timeout".to_string(),
            self.settings.still_settle.as_millis().to_string(),
            "--output".to_string(),
            path.display().to_string(),
        ]);
        args
    }

    fn video_args(&self, path: &Path) -> Vec<String> {
        let mut args = self.common_args();
        args.extend([
            "--timeout".to_string(),
            "0".to_string(), // Run until stopped
            "--codec".to_string(),
            "h264".to_string(),
            "--output".to_string(),
            path.display().to_string(),
        ]);
        args
    }

    /// Ask the recorder to exit cleanly, killing it if it does not
    fn terminate(child: &mut Child) -> Result<()> {
        let pid = child.id() as libc::pid_t;
        // SAFETY: signalling our own child process by pid
        let signalled = unsafe { libc::kill(pid, libc::SIGINT) } == 0;

        if signalled {
            let deadline = Instant::now() + STOP_GRACE;
            while Instant::now() < deadline {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!("Recorder exited with {}", status);
                        return Ok(());
                    }
                    Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                    Err(e) => return Err(Error::Camera(format!("failed to poll recorder: {}", e))),
                }
            }
            warn!("Recorder ignored SIGINT, killing it");
        }

        let _ = child.kill();
        child
            .wait()
            .map_err(|e| Error::Camera(format!("failed to reap recorder: {}", e)))?;
        Ok(())
    }
}

impl Camera for LibcameraCamera {
    fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    fn set_rotation(&mut self, degrees: u32) {
        self.rotation = degrees;
    }

    fn set_annotation(&mut self, text: &str) {
        // The running recorder read the stage file at launch; new text
        // applies from the next capture.
        self.annotation.clear();
        self.annotation.push_str(text);
    }

    fn capture_still(&mut self, path: &Path) -> Result<()> {
        self.write_post_process_file()?;
        let args = self.still_args(path);
        debug!("{} args: {:?}", self.settings.still_program, args);

        let output = Command::new(&self.settings.still_program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::Camera(format!(
                    "failed to spawn {}: {}. Is it installed?",
                    self.settings.still_program, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Camera(format!(
                "{} exited with {}: {}",
                self.settings.still_program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }

    fn start_recording(&mut self, path: &Path) -> Result<()> {
        if self.recorder.is_some() {
            return Err(Error::Camera("recording already in progress".to_string()));
        }

        self.write_post_process_file()?;
        let args = self.video_args(path);

        info!(
            "Starting {}: {} rotated {} degrees",
            self.settings.video_program, self.resolution, self.rotation
        );
        debug!("{} args: {:?}", self.settings.video_program, args);

        let child = Command::new(&self.settings.video_program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::Camera(format!(
                    "failed to spawn {}: {}. Is it installed?",
                    self.settings.video_program, e
                ))
            })?;

        self.recorder = Some(child);
        Ok(())
    }

    fn wait_recording(&mut self, timeout: Duration) -> Result<()> {
        std::thread::sleep(timeout);

        let Some(child) = self.recorder.as_mut() else {
            return Err(Error::Camera("not recording".to_string()));
        };

        match child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => {
                self.recorder = None;
                Err(Error::Camera(format!(
                    "{} exited during recording with {}",
                    self.settings.video_program, status
                )))
            }
            Err(e) => Err(Error::Camera(format!("failed to poll recorder: {}", e))),
        }
    }

    fn stop_recording(&mut self) -> Result<()> {
        let Some(mut child) = self.recorder.take() else {
            return Err(Error::Camera("not recording".to_string()));
        };
        info!("Stopping video capture");
        Self::terminate(&mut child)
    }
}

impl Drop for LibcameraCamera {
    fn drop(&mut self) {
        if let Some(mut child) = self.recorder.take() {
            let _ = Self::terminate(&mut child);
        }
        let _ = fs::remove_file(&self.post_process_file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_args_run_until_stopped() {
        let mut camera = LibcameraCamera::new(CameraSettings::default());
        camera.set_resolution(Resolution::VIDEO);
        let args = camera.video_args(Path::new("/captures/VIDEO1.h264"));

        let joined = args.join(" ");
        assert!(joined.contains("--width 1640 --height 1232"));
        assert!(joined.contains("--rotation 180"));
        assert!(joined.contains("--timeout 0"));
        assert!(joined.contains("--codec h264"));
        assert_eq!(args.last().map(String::as_str), Some("/captures/VIDEO1.h264"));
    }

    #[test]
    fn test_still_args_use_still_mode() {
        let mut camera = LibcameraCamera::new(CameraSettings::default());
        camera.set_resolution(Resolution::STILL);
        let joined = camera.still_args(Path::new("/captures/IMAGE1.jpg")).join(" ");
        assert!(joined.contains("--width 2592 --height 1944"));
        assert!(joined.contains("--timeout 1000"));
        assert!(joined.ends_with("--output /captures/IMAGE1.jpg"));
    }

    #[test]
    fn test_post_process_file_escapes_percent() {
        let mut camera = LibcameraCamera::new(CameraSettings::default());
        camera.set_annotation("Humidity: 50.0% ");
        camera.write_post_process_file().unwrap();

        let written = fs::read_to_string(&camera.post_process_file).unwrap();
        let stage: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(stage["annotate_cv"]["text"], "Humidity: 50.0%% ");
        assert_eq!(stage["annotate_cv"]["bg"], 0);
    }

    #[test]
    fn test_stop_without_recording_is_an_error() {
        let mut camera = LibcameraCamera::new(CameraSettings::default());
        assert!(matches!(camera.stop_recording(), Err(Error::Camera(_))));
    }
}
