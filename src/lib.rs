//! TrailCam - motion-triggered trail camera for the Raspberry Pi
//!
//! This crate provides everything the trail camera needs:
//! - Capture: annotated stills and videos from the Pi camera, BME280 readings
//! - Storage: sequential `IMAGE<n>` / `VIDEO<n>` naming in one output directory
//! - Finalize: remuxing raw H.264 into MP4
//! - Rearm: the PIR-driven loop that keeps recording while motion continues
//!
//! # Architecture
//!
//! A run is strictly sequential:
//!
//! 1. **Startup** - one environmental reading, then a burst of stills
//! 2. **Video cycle** - a fixed-length annotated recording, then transcoding
//! 3. **Rearm loop** - every "Motion Detected" line from the serial port runs
//!    another video cycle and extends the deadline, until it passes quietly
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use trailcam::{Bme280, LibcameraCamera, SerialLineSource, SystemClock, TrailCam, TrailCamConfig};
//!
//! let config = TrailCamConfig::from_env()?;
//! let mut sensor = Bme280::open(&config.sensor)?;
//! let camera = LibcameraCamera::new(config.camera.clone());
//! let source = SerialLineSource::open(&config.serial)?;
//!
//! let session = TrailCam::new(config, &mut sensor, Box::new(camera), Box::new(source), Rc::new(SystemClock))?;
//! let report = session.run()?;
//! ```

// Deployment settings
pub mod config;
pub mod error;

// Time source shared by the capture and rearm loops
pub mod clock;

// Camera, overlay and environment sensor
pub mod capture;

// Output directory and file naming
pub mod storage;

// Raw video to container conversion
pub mod finalize;

// PIR serial link
pub mod serial;

// Motion rearm state machine
pub mod rearm;

// A complete run
pub mod session;

// IR-cut filter GPIO
pub mod ir_filter;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use error::{Error, Result};
pub use config::TrailCamConfig;
pub use clock::{Clock, ManualClock, SystemClock};

// Capture
pub use capture::{AnnotatedCapture, CaptureJob, CaptureKind};
pub use capture::{Camera, CameraSettings, LibcameraCamera, Resolution, SimulatedCamera};
pub use capture::{Bme280, EnvironmentSensor, EnvironmentalSample, FixedSensor, SensorReading};

// Storage
pub use storage::{CapturePattern, CaptureStore, VideoPaths};

// Finalize
pub use finalize::{FinalizeOutcome, TranscoderSettings, VideoFinalizer};

// Serial and rearm
pub use serial::{ChannelLineSource, LineSource, MotionSignal, SerialLineSource, SerialSettings};
pub use rearm::{LoopPhase, MotionRearmLoop, RearmReport, RearmState};

// Session
pub use session::{power_off_host, SessionReport, TrailCam, VideoRecord};

// IR filter
pub use ir_filter::{IrCutFilter, IrFilterMode, IR_FILTER_PIN};
