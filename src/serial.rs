//! Motion event source
//!
//! A PIR board reports motion as newline-terminated ASCII over a UART. Reads
//! time out after one second so the rearm loop can check its deadline even
//! when the line stays quiet.

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, BufRead, BufReader};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// The only payload that counts as motion
pub const MOTION_PAYLOAD: &str = "Motion Detected";

/// Serial link settings
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub device: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            device: "/dev/ttyS0".to_string(),
            baud_rate: 9600,
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// A source of raw lines.
///
/// `read_line` blocks for at most the source's timeout and may return an
/// empty or partial line when nothing complete arrived in time.
pub trait LineSource {
    fn read_line(&mut self) -> Result<Vec<u8>>;
}

/// What a received line means to the rearm loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionSignal {
    Motion,
    Other,
    /// Bytes outside ASCII; treated like any other non-matching line
    Undecodable,
}

/// Strict ASCII decode of one line
pub fn decode_line(bytes: &[u8]) -> Result<&str> {
    if !bytes.is_ascii() {
        return Err(Error::Decode { len: bytes.len() });
    }
    std::str::from_utf8(bytes).map_err(|_| Error::Decode { len: bytes.len() })
}

pub fn classify(bytes: &[u8]) -> MotionSignal {
    match decode_line(bytes) {
        Ok(text) if text.trim() == MOTION_PAYLOAD => MotionSignal::Motion,
        Ok(_) => MotionSignal::Other,
        Err(e) => {
            debug!("Ignoring serial line: {}", e);
            MotionSignal::Undecodable
        }
    }
}

/// Lines from a UART, 8N1
pub struct SerialLineSource {
    reader: BufReader<Box<dyn SerialPort>>,
}

impl SerialLineSource {
    pub fn open(settings: &SerialSettings) -> Result<Self> {
        let port = serialport::new(&settings.device, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open()?;

        info!(
            "Opened serial port {} at {} baud",
            settings.device, settings.baud_rate
        );

        Ok(Self {
            reader: BufReader::new(port),
        })
    }
}

impl LineSource for SerialLineSource {
    fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(_) => Ok(line),
            // Whatever arrived before the timeout is returned as a partial line
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(line),
            Err(e) => Err(Error::SerialIo(e)),
        }
    }
}

/// Lines delivered over a channel, e.g. from stdin during development
pub struct ChannelLineSource {
    rx: Receiver<Vec<u8>>,
    timeout: Duration,
}

impl ChannelLineSource {
    pub fn new(rx: Receiver<Vec<u8>>, timeout: Duration) -> Self {
        Self { rx, timeout }
    }

    /// Feed lines typed on stdin into a new source
    pub fn stdin(timeout: Duration) -> Result<Self> {
        Self::spawn_reader("stdin reader", BufReader::new(io::stdin()), timeout)
    }

    /// Forward every line of `reader` from a background thread
    pub fn spawn_reader<R>(name: &str, mut reader: R, timeout: Duration) -> Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let thread_name = name.to_string();
        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                loop {
                    let mut line = Vec::new();
                    match reader.read_until(b'\n', &mut line) {
                        Ok(0) => break,
                        Ok(_) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("{} failed: {}", thread_name, e);
                            break;
                        }
                    }
                }
                debug!("{} finished", thread_name);
            })
            .map_err(Error::SerialIo)?;
        Ok(Self::new(rx, timeout))
    }
}

impl LineSource for ChannelLineSource {
    fn read_line(&mut self) -> Result<Vec<u8>> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(line) => Ok(line),
            Err(RecvTimeoutError::Timeout) => Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => {
                // Keep the read cadence once the producer is gone
                thread::sleep(self.timeout);
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_motion_line() {
        assert_eq!(classify(b"Motion Detected\r\n"), MotionSignal::Motion);
        assert_eq!(classify(b"  Motion Detected  "), MotionSignal::Motion);
        assert_eq!(classify(b"Motion Detected"), MotionSignal::Motion);
    }

    #[test]
    fn test_classify_is_case_sensitive_and_exact() {
        assert_eq!(classify(b"motion detected\n"), MotionSignal::Other);
        assert_eq!(classify(b"Motion Detected!\n"), MotionSignal::Other);
        assert_eq!(classify(b"Motion Det"), MotionSignal::Other);
        assert_eq!(classify(b""), MotionSignal::Other);
    }

    #[test]
    fn test_non_ascii_is_undecodable() {
        assert_eq!(classify(b"Motion Detected\xff\n"), MotionSignal::Undecodable);
        // Valid UTF-8 is still rejected
        assert_eq!(classify("Motion Détected\n".as_bytes()), MotionSignal::Undecodable);
        assert!(matches!(decode_line(b"\x80"), Err(Error::Decode { len: 1 })));
    }

    #[test]
    fn test_channel_source_times_out_with_empty_line() {
        let (tx, rx) = mpsc::channel();
        let mut source = ChannelLineSource::new(rx, Duration::from_millis(10));

        tx.send(b"Motion Detected\n".to_vec()).unwrap();
        assert_eq!(source.read_line().unwrap(), b"Motion Detected\n".to_vec());
        assert!(source.read_line().unwrap().is_empty());

        drop(tx);
        assert!(source.read_line().unwrap().is_empty());
    }

    #[test]
    fn test_reader_thread_forwards_lines_then_goes_quiet() {
        let input = io::Cursor::new(b"noise\nMotion Detected\n".to_vec());
        let mut source =
            ChannelLineSource::spawn_reader("test reader", input, Duration::from_secs(2)).unwrap();

        assert_eq!(source.read_line().unwrap(), b"noise\n".to_vec());
        assert_eq!(classify(&source.read_line().unwrap()), MotionSignal::Motion);
        // Reader hit EOF and dropped its sender
        assert!(source.read_line().unwrap().is_empty());
    }
}
