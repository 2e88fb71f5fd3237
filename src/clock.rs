//! Monotonic time source used by the capture and rearm loops.
//!
//! Production code runs on [`SystemClock`]. [`ManualClock`] keeps virtual
//! time that only moves when something sleeps on it, which lets the
//! simulated camera and the tests cover two-minute rearm windows instantly.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Source of monotonic time plus the ability to block on it.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock backed implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock advanced only by `sleep` and `advance`.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    /// Instant at which this clock was created.
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_moves_only_on_sleep() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.sleep(Duration::from_millis(200));
        assert_eq!(clock.now() - start, Duration::from_millis(200));

        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.elapsed(), Duration::from_millis(1200));
    }
}
