//! Edge-driven capture state machine
//!
//! Converts the stream of line events for one input pin into zero or one
//! raw code per key press. Pure logic, no hardware dependencies: every
//! event handler returns the watchdog command to apply and, at end of
//! code, the finished buffer. The session task owns the only mutable
//! reference and applies the commands, so event handling never waits on
//! I/O.
//!
//! A code starts when the gap since the previous edge exceeds the pre-gap
//! threshold (the line has been idle between key presses), and ends when
//! either an in-code gap exceeds the post-gap threshold or the watchdog
//! fires. The gap that started the code is not part of it.

use irck_common::{Error, Result};

use crate::config::CaptureConfig;

/// Watchdog command produced by a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogCmd {
    /// Arm (or re-arm) with the given window in milliseconds.
    Arm(u32),
    /// Disarm.
    Disarm,
}

/// Result of feeding one event to the machine.
#[derive(Debug)]
pub struct Step {
    /// Watchdog command to apply, if any.
    pub watchdog: Option<WatchdogCmd>,

    /// End-of-code result: the raw gap buffer, or a retryable
    /// [`Error::ShortCapture`] for a button repeat / contact bounce.
    pub finished: Option<Result<Vec<f64>>>,
}

impl Step {
    fn none() -> Self {
        Self {
            watchdog: None,
            finished: None,
        }
    }

    fn arm(post_gap_ms: u32) -> Self {
        Self {
            watchdog: Some(WatchdogCmd::Arm(post_gap_ms)),
            finished: None,
        }
    }

    fn finish(result: Result<Vec<f64>>) -> Self {
        Self {
            watchdog: Some(WatchdogCmd::Disarm),
            finished: Some(result),
        }
    }
}

/// Capture FSM for one input line.
pub struct CaptureMachine {
    pre_gap_us: u64,
    post_gap_us: u64,
    post_gap_ms: u32,
    short_code: usize,

    last_tick_us: u64,
    in_code: bool,
    buffer: Vec<f64>,
}

impl CaptureMachine {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            pre_gap_us: config.pre_gap_us(),
            post_gap_us: config.post_gap_us(),
            post_gap_ms: config.post_gap_ms,
            short_code: config.short_code,
            last_tick_us: 0,
            in_code: false,
            buffer: Vec::new(),
        }
    }

    /// Whether an edge has opened a code that has not yet closed.
    pub fn in_code(&self) -> bool {
        self.in_code
    }

    /// Feed one edge at a monotonic microsecond tick.
    pub fn on_edge(&mut self, tick_us: u64) -> Step {
        let diff = tick_us.wrapping_sub(self.last_tick_us);
        self.last_tick_us = tick_us;

        if diff > self.pre_gap_us && !self.in_code {
            // Start of a code; the idle gap itself is not recorded.
            self.in_code = true;
            self.buffer.clear();
            Step::arm(self.post_gap_ms)
        } else if diff > self.post_gap_us && self.in_code {
            // An over-long gap ends the code; the gap is not recorded.
            self.in_code = false;
            Step::finish(self.take_buffer())
        } else if self.in_code {
            self.buffer.push(diff as f64);
            Step::arm(self.post_gap_ms)
        } else {
            // Spurious edge while idle.
            Step::none()
        }
    }

    /// Feed a watchdog timeout.
    pub fn on_timeout(&mut self) -> Step {
        if self.in_code {
            self.in_code = false;
            Step::finish(self.take_buffer())
        } else {
            Step {
                watchdog: Some(WatchdogCmd::Disarm),
                finished: None,
            }
        }
    }

    /// Return to idle, dropping any partial buffer.
    pub fn reset(&mut self) {
        self.in_code = false;
        self.buffer.clear();
    }

    fn take_buffer(&mut self) -> Result<Vec<f64>> {
        let pulses = self.buffer.len();
        if pulses > self.short_code {
            Ok(std::mem::take(&mut self.buffer))
        } else {
            self.buffer.clear();
            Err(Error::ShortCapture { pulses })
        }
    }
}
