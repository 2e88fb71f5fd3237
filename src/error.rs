//! Error types for the trail camera controller.
//!
//! Hardware, filesystem and serial transport failures are fatal to the
//! control loop and propagate to the binary. Decode and transcode failures
//! are handled where they occur and only surface here when a caller asks
//! for them explicitly.

use std::path::PathBuf;
use thiserror::Error;

/// The main error enum, grouping failures by the subsystem that raised them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("camera error: {0}")]
    Camera(String),

    #[error("environment sensor error: {0}")]
    Sensor(String),

    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("serial transport error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("serial read failed: {0}")]
    SerialIo(#[source] std::io::Error),

    #[error("transcode failed for {path:?}: {reason}")]
    Transcode { path: PathBuf, reason: String },

    #[error("line is not valid ASCII ({len} bytes)")]
    Decode { len: usize },

    #[error("filesystem error at {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("host command failed: {0}")]
    Host(String),
}

impl Error {
    /// Wrap an I/O error with the path it concerns.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<rppal::i2c::Error> for Error {
    fn from(e: rppal::i2c::Error) -> Self {
        Error::Sensor(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
