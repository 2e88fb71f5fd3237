//! Video finalization
//!
//! Remuxes the raw H.264 stream into an MP4 container with an external tool
//! (MP4Box by default) and removes the raw file once conversion succeeded.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// External transcoder invocation
#[derive(Debug, Clone)]
pub struct TranscoderSettings {
    pub program: String,
    /// Arguments placed before the source and destination paths
    pub leading_args: Vec<String>,
    /// Surface transcoder failures as errors instead of warnings
    pub strict: bool,
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            program: "MP4Box".to_string(),
            leading_args: vec!["-add".to_string()],
            strict: false,
        }
    }
}

/// Result of one finalize call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Container written and raw stream removed
    Converted { output: PathBuf },
    /// Transcoder failed; the raw stream was kept
    Failed { raw: PathBuf, reason: String },
}

impl FinalizeOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, FinalizeOutcome::Converted { .. })
    }
}

pub struct VideoFinalizer {
    settings: TranscoderSettings,
}

impl VideoFinalizer {
    pub fn new(settings: TranscoderSettings) -> Self {
        Self { settings }
    }

    /// Transcoder command for one conversion, paths passed as literal arguments
    pub fn command(&self, raw: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.settings.program);
        cmd.args(&self.settings.leading_args)
            .arg(raw)
            .arg(output)
            .stdin(Stdio::null());
        cmd
    }

    /// Convert `raw` into `output`, deleting `raw` on success
    pub fn finalize(&self, raw: &Path, output: &Path) -> Result<FinalizeOutcome> {
        info!("Converting video to MP4 as {:?}", output);
        let mut cmd = self.command(raw, output);
        debug!("Transcoder command: {:?}", cmd);

        let failure = match cmd.output() {
            Ok(result) if result.status.success() => None,
            Ok(result) => {
                let stderr = String::from_utf8_lossy(&result.stderr);
                Some(format!(
                    "{} exited with {}: {}",
                    self.settings.program,
                    result.status,
                    stderr.trim()
                ))
            }
            Err(e) => Some(format!("failed to run {}: {}", self.settings.program, e)),
        };

        if let Some(reason) = failure {
            if self.settings.strict {
                return Err(Error::Transcode {
                    path: raw.to_path_buf(),
                    reason,
                });
            }
            warn!("Keeping raw video {:?}: {}", raw, reason);
            return Ok(FinalizeOutcome::Failed {
                raw: raw.to_path_buf(),
                reason,
            });
        }

        fs::remove_file(raw).map_err(|e| Error::filesystem(raw, e))?;
        debug!("Removed intermediate {:?}", raw);

        Ok(FinalizeOutcome::Converted {
            output: output.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use tempfile::tempdir;

    fn copy_transcoder(strict: bool) -> VideoFinalizer {
        VideoFinalizer::new(TranscoderSettings {
            program: "cp".to_string(),
            leading_args: Vec::new(),
            strict,
        })
    }

    #[test]
    fn test_command_passes_paths_as_literal_arguments() {
        let finalizer = VideoFinalizer::new(TranscoderSettings::default());
        let raw = Path::new("/captures/VIDEO1 ; rm -rf.h264");
        let output = Path::new("/captures/VIDEO1 ; rm -rf.h264.mp4");

        let cmd = finalizer.command(raw, output);
        assert_eq!(cmd.get_program(), OsStr::new("MP4Box"));
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(args, vec![OsStr::new("-add"), raw.as_os_str(), output.as_os_str()]);
    }

    #[test]
    fn test_finalize_removes_raw_on_success() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("VIDEO1.h264");
        let output = dir.path().join("VIDEO1.h264.mp4");
        fs::write(&raw, b"raw video").unwrap();

        let outcome = copy_transcoder(false).finalize(&raw, &output).unwrap();

        assert_eq!(outcome, FinalizeOutcome::Converted { output: output.clone() });
        assert!(!raw.exists());
        assert_eq!(fs::read(&output).unwrap(), b"raw video");
    }

    #[test]
    fn test_failed_transcode_keeps_raw() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("VIDEO1.h264");
        fs::write(&raw, b"raw video").unwrap();

        // cp into a directory that does not exist fails
        let output = dir.path().join("missing").join("VIDEO1.h264.mp4");
        let outcome = copy_transcoder(false).finalize(&raw, &output).unwrap();

        assert!(!outcome.is_converted());
        assert!(raw.exists());
    }

    #[test]
    fn test_strict_mode_surfaces_failure() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("VIDEO1.h264");
        fs::write(&raw, b"raw video").unwrap();

        let finalizer = VideoFinalizer::new(TranscoderSettings {
            program: "trailcam-no-such-transcoder".to_string(),
            leading_args: Vec::new(),
            strict: true,
        });
        let err = finalizer
            .finalize(&raw, &dir.path().join("VIDEO1.h264.mp4"))
            .unwrap_err();

        assert!(matches!(err, Error::Transcode { .. }));
        assert!(raw.exists());
    }
}
