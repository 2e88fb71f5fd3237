//! Capture output storage
//!
//! All footage lands in a single deployment-configured directory:
//! - `IMAGE<n>.jpg` still images
//! - `VIDEO<n>.h264` raw recordings (intermediate)
//! - `VIDEO<n>.h264.mp4` finalized recordings

pub mod namer;

pub use namer::{next_path, next_path_with, CapturePattern};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const IMAGE_PATTERN: &str = "IMAGE{}.jpg";
pub const VIDEO_PATTERN: &str = "VIDEO{}.h264";
/// Appended to the raw recording path to name the finalized container
pub const CONTAINER_EXTENSION: &str = ".mp4";

/// Paths for one video cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPaths {
    /// Raw H.264 stream written by the camera
    pub raw: PathBuf,
    /// Container produced by the finalizer
    pub output: PathBuf,
}

impl VideoPaths {
    pub fn for_raw(raw: PathBuf) -> Self {
        let mut output = raw.clone().into_os_string();
        output.push(CONTAINER_EXTENSION);
        Self {
            raw,
            output: PathBuf::from(output),
        }
    }
}

/// Output directory plus the naming patterns used inside it
#[derive(Debug, Clone)]
pub struct CaptureStore {
    root: PathBuf,
    images: CapturePattern,
    videos: CapturePattern,
}

impl CaptureStore {
    /// Open the store, creating the directory tree if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            info!("Creating capture directory: {:?}", root);
        }
        fs::create_dir_all(&root).map_err(|e| Error::filesystem(&root, e))?;

        Ok(Self {
            images: CapturePattern::in_dir(&root, IMAGE_PATTERN)?,
            videos: CapturePattern::in_dir(&root, VIDEO_PATTERN)?,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next unused still image path
    pub fn next_image(&self) -> Result<PathBuf> {
        let path = next_path(&self.images)?;
        debug!("Next image path: {:?}", path);
        Ok(path)
    }

    /// Next video index whose raw and finalized paths are both unused.
    ///
    /// The finalizer deletes raw files after conversion, so probing the raw
    /// pattern alone would hand out an index whose container already exists.
    pub fn next_video(&self) -> Result<VideoPaths> {
        let raw = next_path_with(&self.videos, |raw| {
            if raw.try_exists()? {
                return Ok(true);
            }
            VideoPaths::for_raw(raw.to_path_buf()).output.try_exists()
        })?;
        let paths = VideoPaths::for_raw(raw);
        debug!("Next video paths: {:?}", paths);
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_nested_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("TrailCam").join("captures");

        let store = CaptureStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.next_image().unwrap(), root.join("IMAGE1.jpg"));
    }

    #[test]
    fn test_video_paths_append_container_extension() {
        let paths = VideoPaths::for_raw(PathBuf::from("/captures/VIDEO3.h264"));
        assert_eq!(paths.output, PathBuf::from("/captures/VIDEO3.h264.mp4"));
    }

    #[test]
    fn test_next_video_skips_finalized_indices() {
        let dir = tempdir().unwrap();
        let store = CaptureStore::open(dir.path()).unwrap();

        // VIDEO1 finalized (raw removed), VIDEO2 kept raw after a failed conversion
        fs::write(dir.path().join("VIDEO1.h264.mp4"), b"mp4").unwrap();
        fs::write(dir.path().join("VIDEO2.h264"), b"h264").unwrap();

        let paths = store.next_video().unwrap();
        assert_eq!(paths.raw, dir.path().join("VIDEO3.h264"));
        assert_eq!(paths.output, dir.path().join("VIDEO3.h264.mp4"));
    }
}
