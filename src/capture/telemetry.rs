//! Environmental telemetry capture
//!
//! Reads temperature, pressure and humidity from a Bosch BME280 on the
//! Linux I2C bus. The controller takes exactly one reading at startup and
//! burns it into every overlay for the rest of the run.

use chrono::{DateTime, Local};
use rppal::i2c::I2c;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Default I2C bus on a Raspberry Pi header
pub const DEFAULT_I2C_BUS: u8 = 1;
/// BME280 address with SDO tied low
pub const DEFAULT_SENSOR_ADDRESS: u16 = 0x76;

const BME280_CHIP_ID: u8 = 0x60;

const REG_CALIB_00: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB_26: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_DATA: u8 = 0xF7;

/// x1 oversampling on all channels, forced mode
const CTRL_HUM_X1: u8 = 0b001;
const CTRL_MEAS_FORCED_X1: u8 = (0b001 << 5) | (0b001 << 2) | 0b01;
const STATUS_MEASURING: u8 = 1 << 3;

/// Sensor bus settings
#[derive(Debug, Clone)]
pub struct SensorSettings {
    pub i2c_bus: u8,
    pub address: u16,
    /// Upper bound on waiting for a forced conversion to complete
    pub conversion_timeout: Duration,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            i2c_bus: DEFAULT_I2C_BUS,
            address: DEFAULT_SENSOR_ADDRESS,
            conversion_timeout: Duration::from_millis(100),
        }
    }
}

/// One compensated sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub timestamp: DateTime<Local>,
    /// Degrees Celsius
    pub temperature: f64,
    /// Hectopascal
    pub pressure: f64,
    /// Relative humidity, percent
    pub humidity: f64,
}

/// Anything that can produce a single environmental reading
pub trait EnvironmentSensor {
    fn sample(&mut self) -> Result<SensorReading>;
}

/// The startup reading shown in every overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalSample {
    /// Degrees Celsius, one decimal
    pub temperature: f64,
    /// Relative humidity, one decimal
    pub humidity: f64,
    pub taken_at: DateTime<Local>,
}

impl EnvironmentalSample {
    /// Take the one reading used for the lifetime of the process
    pub fn acquire(sensor: &mut dyn EnvironmentSensor) -> Result<Self> {
        let reading = sensor.sample()?;
        let sample = Self::from_reading(&reading);
        info!(
            "Environment: {:.1}C, {:.1}% humidity, {:.1} hPa",
            sample.temperature, sample.humidity, reading.pressure
        );
        Ok(sample)
    }

    pub fn from_reading(reading: &SensorReading) -> Self {
        Self {
            temperature: round_tenths(reading.temperature),
            humidity: round_tenths(reading.humidity),
            taken_at: reading.timestamp,
        }
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Fixed readings for running without a sensor attached
#[derive(Debug, Clone)]
pub struct FixedSensor {
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
}

impl Default for FixedSensor {
    fn default() -> Self {
        Self {
            temperature: 20.0,
            pressure: 1013.25,
            humidity: 50.0,
        }
    }
}

impl EnvironmentSensor for FixedSensor {
    fn sample(&mut self) -> Result<SensorReading> {
        Ok(SensorReading {
            timestamp: Local::now(),
            temperature: self.temperature,
            pressure: self.pressure,
            humidity: self.humidity,
        })
    }
}

/// Factory trimming coefficients stored in the sensor NVM
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// Decode from the 0x88..=0xA1 and 0xE1..=0xE7 register blocks
    pub fn from_registers(tp: &[u8; 26], hum: &[u8; 7]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);

        // H4 and H5 share the nibbles of 0xE5
        let h4 = ((hum[3] as i8 as i16) << 4) | (hum[4] & 0x0F) as i16;
        let h5 = ((hum[5] as i8 as i16) << 4) | (hum[4] >> 4) as i16;

        Self {
            t1: u16_at(0),
            t2: i16_at(2),
            t3: i16_at(4),
            p1: u16_at(6),
            p2: i16_at(8),
            p3: i16_at(10),
            p4: i16_at(12),
            p5: i16_at(14),
            p6: i16_at(16),
            p7: i16_at(18),
            p8: i16_at(20),
            p9: i16_at(22),
            h1: tp[25],
            h2: i16::from_le_bytes([hum[0], hum[1]]),
            h3: hum[2],
            h4,
            h5,
            h6: hum[6] as i8,
        }
    }

    /// Fine temperature value shared by the pressure and humidity formulas
    fn t_fine(&self, adc_t: i32) -> f64 {
        let adc_t = adc_t as f64;
        let t1 = self.t1 as f64;
        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * self.t2 as f64;
        let var2 = (adc_t / 131072.0 - t1 / 8192.0).powi(2) * self.t3 as f64;
        var1 + var2
    }

    /// Temperature in degrees Celsius
    pub fn temperature(&self, raw: &RawSample) -> f64 {
        self.t_fine(raw.temperature) / 5120.0
    }

    /// Pressure in pascal
    pub fn pressure(&self, raw: &RawSample) -> f64 {
        let t_fine = self.t_fine(raw.temperature);

        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * self.p6 as f64 / 32768.0;
        var2 += var1 * self.p5 as f64 * 2.0;
        var2 = var2 / 4.0 + self.p4 as f64 * 65536.0;
        var1 = (self.p3 as f64 * var1 * var1 / 524288.0 + self.p2 as f64 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * self.p1 as f64;
        if var1 == 0.0 {
            return 0.0;
        }

        let mut p = 1048576.0 - raw.pressure as f64;
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        let var1 = self.p9 as f64 * p * p / 2147483648.0;
        let var2 = p * self.p8 as f64 / 32768.0;
        p + (var1 + var2 + self.p7 as f64) / 16.0
    }

    /// Relative humidity in percent, clamped to 0..=100
    pub fn humidity(&self, raw: &RawSample) -> f64 {
        let h = self.t_fine(raw.temperature) - 76800.0;
        let h = (raw.humidity as f64 - (self.h4 as f64 * 64.0 + self.h5 as f64 / 16384.0 * h))
            * (self.h2 as f64 / 65536.0
                * (1.0 + self.h6 as f64 / 67108864.0 * h * (1.0 + self.h3 as f64 / 67108864.0 * h)));
        let h = h * (1.0 - self.h1 as f64 * h / 524288.0);
        h.clamp(0.0, 100.0)
    }
}

/// Uncompensated ADC values from one burst read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub pressure: i32,
    pub temperature: i32,
    pub humidity: i32,
}

impl RawSample {
    /// Decode the 0xF7..=0xFE data block
    pub fn from_registers(data: &[u8; 8]) -> Self {
        let adc20 = |msb: u8, lsb: u8, xlsb: u8| {
            ((msb as i32) << 12) | ((lsb as i32) << 4) | ((xlsb as i32) >> 4)
        };
        Self {
            pressure: adc20(data[0], data[1], data[2]),
            temperature: adc20(data[3], data[4], data[5]),
            humidity: ((data[6] as i32) << 8) | data[7] as i32,
        }
    }
}

/// BME280 on a Linux I2C bus
pub struct Bme280 {
    i2c: I2c,
    calibration: Calibration,
    conversion_timeout: Duration,
}

impl Bme280 {
    /// Open the bus, verify the chip and load its calibration
    pub fn open(settings: &SensorSettings) -> Result<Self> {
        let mut i2c = I2c::with_bus(settings.i2c_bus)?;
        i2c.set_slave_address(settings.address)?;

        let chip_id = i2c.smbus_read_byte(REG_CHIP_ID)?;
        if chip_id != BME280_CHIP_ID {
            return Err(Error::Sensor(format!(
                "unexpected chip id 0x{:02x} at address 0x{:02x} (expected 0x{:02x})",
                chip_id, settings.address, BME280_CHIP_ID
            )));
        }

        let calibration = Self::load_calibration(&i2c)?;
        debug!("BME280 calibration: {:?}", calibration);

        Ok(Self {
            i2c,
            calibration,
            conversion_timeout: settings.conversion_timeout,
        })
    }

    fn load_calibration(i2c: &I2c) -> Result<Calibration> {
        let mut tp = [0u8; 26];
        let mut hum = [0u8; 7];
        i2c.write_read(&[REG_CALIB_00], &mut tp)?;
        i2c.write_read(&[REG_CALIB_26], &mut hum)?;
        Ok(Calibration::from_registers(&tp, &hum))
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Trigger a forced conversion and wait for it to finish
    fn read_raw(&mut self) -> Result<RawSample> {
        // ctrl_hum only takes effect after a write to ctrl_meas
        self.i2c.smbus_write_byte(REG_CTRL_HUM, CTRL_HUM_X1)?;
        self.i2c.smbus_write_byte(REG_CTRL_MEAS, CTRL_MEAS_FORCED_X1)?;

        let poll = Duration::from_millis(2);
        let mut waited = Duration::ZERO;
        while self.i2c.smbus_read_byte(REG_STATUS)? & STATUS_MEASURING != 0 {
            if waited >= self.conversion_timeout {
                return Err(Error::Sensor("conversion did not complete".to_string()));
            }
            std::thread::sleep(poll);
            waited += poll;
        }

        let mut data = [0u8; 8];
        self.i2c.write_read(&[REG_DATA], &mut data)?;
        Ok(RawSample::from_registers(&data))
    }
}

impl EnvironmentSensor for Bme280 {
    fn sample(&mut self) -> Result<SensorReading> {
        let raw = self.read_raw()?;
        debug!("BME280 raw sample: {:?}", raw);
        Ok(SensorReading {
            timestamp: Local::now(),
            temperature: self.calibration.temperature(&raw),
            pressure: self.calibration.pressure(&raw) / 100.0,
            humidity: self.calibration.humidity(&raw),
        })
    }
}
