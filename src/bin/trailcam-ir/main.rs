//! TrailCam IR-cut Filter Switch
//!
//! ## Usage
//!
//! ```bash
//! # Filter in, for daylight colour
//! trailcam-ir day
//!
//! # Filter out, for IR illuminated night footage
//! trailcam-ir night
//! ```
//!
//! `1` and `0` are accepted for day and night.

use anyhow::{Context, Result};
use tracing::info;
use trailcam::{IrCutFilter, IrFilterMode, IR_FILTER_PIN};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trailcam=info".parse().unwrap()),
        )
        .init();

    let arg = std::env::args()
        .nth(1)
        .context("Usage: trailcam-ir <day|night|1|0>")?;
    let mode: IrFilterMode = arg.parse()?;

    let mut filter = IrCutFilter::open(IR_FILTER_PIN)
        .with_context(|| format!("Failed to claim GPIO {}", IR_FILTER_PIN))?;
    filter.set_mode(mode);

    info!("IR filter set on GPIO {}", IR_FILTER_PIN);
    Ok(())
}
