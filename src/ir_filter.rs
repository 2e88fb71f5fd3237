//! IR-cut filter switch
//!
//! The camera module's IR-cut filter is driven from a single GPIO pin: low
//! leaves the filter in (day), high pulls it out for night vision.

use rppal::gpio::{Gpio, Level, OutputPin};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::error::{Error, Result};

/// BCM pin wired to the filter driver
pub const IR_FILTER_PIN: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrFilterMode {
    Day,
    Night,
}

impl IrFilterMode {
    pub fn level(self) -> Level {
        match self {
            IrFilterMode::Day => Level::Low,
            IrFilterMode::Night => Level::High,
        }
    }
}

impl fmt::Display for IrFilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrFilterMode::Day => write!(f, "Day mode"),
            IrFilterMode::Night => write!(f, "Night mode"),
        }
    }
}

impl FromStr for IrFilterMode {
    type Err = Error;

    /// `day`/`1` or `night`/`0`
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "1" => Ok(IrFilterMode::Day),
            "night" | "0" => Ok(IrFilterMode::Night),
            other => Err(Error::Config(format!(
                "unknown IR filter mode {:?}, expected day, night, 1 or 0",
                other
            ))),
        }
    }
}

pub struct IrCutFilter {
    pin: OutputPin,
}

impl IrCutFilter {
    pub fn open(pin: u8) -> Result<Self> {
        let mut pin = Gpio::new()?.get(pin)?.into_output();
        // The filter must stay where it was put after this process exits
        pin.set_reset_on_drop(false);
        Ok(Self { pin })
    }

    pub fn set_mode(&mut self, mode: IrFilterMode) {
        self.pin.write(mode.level());
        info!("{}", mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("day".parse::<IrFilterMode>().unwrap(), IrFilterMode::Day);
        assert_eq!("1".parse::<IrFilterMode>().unwrap(), IrFilterMode::Day);
        assert_eq!(" Night ".parse::<IrFilterMode>().unwrap(), IrFilterMode::Night);
        assert_eq!("0".parse::<IrFilterMode>().unwrap(), IrFilterMode::Night);
        assert!(matches!("dusk".parse::<IrFilterMode>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_levels() {
        assert_eq!(IrFilterMode::Day.level(), Level::Low);
        assert_eq!(IrFilterMode::Night.level(), Level::High);
        assert_eq!(IrFilterMode::Night.to_string(), "Night mode");
    }
}
