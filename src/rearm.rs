//! Motion rearm loop
//!
//! After the startup captures the camera stays armed for a rolling window.
//! Every "Motion Detected" line from the PIR board runs another video cycle
//! and pushes the deadline out again; once the deadline passes with no motion
//! the loop expires.
//!
//! ```text
//! ArmedWaiting --motion--> Capturing --cycle done--> ArmedWaiting
//!      |
//!      +--now > deadline--> Expired
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::serial::{classify, LineSource, MotionSignal};

/// Longest inactivity window; longer requests are clamped
pub const MAX_REARM_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Where the loop is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    ArmedWaiting,
    Capturing,
    Expired,
}

/// The rolling expiry deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RearmState {
    deadline: Instant,
}

impl RearmState {
    pub fn armed(now: Instant, window: Duration) -> Self {
        Self {
            deadline: now + window.min(MAX_REARM_WINDOW),
        }
    }

    pub fn rearm(&mut self, now: Instant, window: Duration) {
        self.deadline = now + window.min(MAX_REARM_WINDOW);
    }

    /// Strictly past the deadline
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.deadline
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Summary of one armed period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RearmReport {
    pub armed_at: Instant,
    pub initial_deadline: Instant,
    pub final_deadline: Instant,
    pub expired_at: Instant,
    pub motion_events: u32,
    pub ignored_lines: u32,
    pub undecodable_lines: u32,
}

pub struct MotionRearmLoop<'a> {
    source: &'a mut dyn LineSource,
    clock: &'a dyn Clock,
    window: Duration,
    state: RearmState,
    phase: LoopPhase,
    report: RearmReport,
}

impl<'a> MotionRearmLoop<'a> {
    /// Arm with `deadline = now + window`
    pub fn new(source: &'a mut dyn LineSource, clock: &'a dyn Clock, window: Duration) -> Self {
        let now = clock.now();
        let state = RearmState::armed(now, window);
        info!(
            "Waiting up to {} seconds for further motion",
            window.as_secs()
        );
        Self {
            source,
            clock,
            window,
            state,
            phase: LoopPhase::ArmedWaiting,
            report: RearmReport {
                armed_at: now,
                initial_deadline: state.deadline(),
                final_deadline: state.deadline(),
                expired_at: now,
                motion_events: 0,
                ignored_lines: 0,
                undecodable_lines: 0,
            },
        }
    }

    pub fn state(&self) -> &RearmState {
        &self.state
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// One iteration: check the deadline, then read and handle a single line.
    ///
    /// `on_motion` runs the capture cycle; the deadline is reset only after
    /// it returns.
    pub fn step<F>(&mut self, on_motion: &mut F) -> Result<LoopPhase>
    where
        F: FnMut() -> Result<()>,
    {
        if self.phase == LoopPhase::Expired {
            return Ok(self.phase);
        }

        let now = self.clock.now();
        if self.state.is_expired(now) {
            warn!(
                "No motion for {} seconds, stopping",
                self.window.as_secs()
            );
            self.phase = LoopPhase::Expired;
            self.report.expired_at = now;
            self.report.final_deadline = self.state.deadline();
            return Ok(self.phase);
        }

        let line = self.source.read_line()?;
        match classify(&line) {
            MotionSignal::Motion => {
                info!("PIR sensor detected further motion");
                self.phase = LoopPhase::Capturing;
                self.report.motion_events += 1;

                let cycle = on_motion();
                // A failed cycle still leaves the loop armed with the old deadline
                self.phase = LoopPhase::ArmedWaiting;
                cycle?;

                self.state.rearm(self.clock.now(), self.window);
                info!(
                    "Waiting up to {} seconds for further motion",
                    self.window.as_secs()
                );
            }
            MotionSignal::Other => {
                if !line.is_empty() {
                    debug!("Ignoring serial line {:?}", String::from_utf8_lossy(&line));
                    self.report.ignored_lines += 1;
                }
            }
            MotionSignal::Undecodable => self.report.undecodable_lines += 1,
        }

        Ok(self.phase)
    }

    /// Step until the deadline passes with no further motion
    pub fn run<F>(mut self, mut on_motion: F) -> Result<RearmReport>
    where
        F: FnMut() -> Result<()>,
    {
        while self.step(&mut on_motion)? != LoopPhase::Expired {}
        Ok(self.report)
    }
}
