//! Hardware capability traits
//!
//! The codec consumes two capabilities and nothing else from the GPIO
//! layer: an edge-reporting input line with a watchdog primitive, and a
//! waveform output line. Real backends (pigpio daemon, memory-mapped GPIO)
//! implement these traits out of tree; [`mock`] provides the deterministic
//! in-process backend used by tests and the `sim` demo.

pub mod mock;

use irck_common::Result;
use tokio::sync::mpsc;

/// Edge polarity reported by the input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Rising,
    Falling,
}

/// One event on the monitored input line.
///
/// Ticks are monotonic microseconds from the hardware clock. Events are
/// delivered in strict hardware arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// Level transition at `tick_us`.
    Edge { kind: EdgeKind, tick_us: u64 },

    /// The armed watchdog window elapsed with no transition.
    Timeout { tick_us: u64 },
}

/// Edge-reporting input capability.
///
/// Implementations must never require the consumer to keep up in real
/// time: events buffer in the subscription channel until read.
pub trait EdgeSource: Send {
    /// Prepare the line for monitoring, suppressing transitions shorter
    /// than `glitch_us`. A value of 0 clears the filter.
    fn configure(&mut self, glitch_us: u32) -> Result<()>;

    /// Begin reporting events. Any previous subscription is replaced.
    fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<LineEvent>>;

    /// Arm (or re-arm) the watchdog: a [`LineEvent::Timeout`] is delivered
    /// if no edge occurs within `timeout_ms`.
    fn set_watchdog(&mut self, timeout_ms: u32) -> Result<()>;

    /// Disarm the watchdog.
    fn clear_watchdog(&mut self) -> Result<()>;

    /// Stop reporting and close the subscription channel.
    fn cancel(&mut self) -> Result<()>;
}

/// One level step inside a waveform segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveStep {
    /// Line driven high (carrier) for the step when true.
    pub high: bool,
    /// Step length in microseconds.
    pub micros: u32,
}

impl WaveStep {
    pub fn on(micros: u32) -> Self {
        Self { high: true, micros }
    }

    pub fn off(micros: u32) -> Self {
        Self {
            high: false,
            micros,
        }
    }
}

/// Opaque handle to a waveform segment registered with the output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentHandle(pub u32);

/// Waveform output capability.
///
/// Segments are created once, referenced any number of times within a
/// chain, and must be released exactly once when the chain's playback call
/// finishes.
pub trait OutputLine: Send {
    /// Configure the line for output.
    fn set_output_mode(&mut self) -> Result<()>;

    /// Register a waveform segment and return its handle.
    fn create_segment(&mut self, steps: &[WaveStep]) -> Result<SegmentHandle>;

    /// Start transmitting the chained segments in order.
    ///
    /// Fails with [`irck_common::Error::HardwareBusy`] while a previous
    /// chain is still transmitting.
    fn submit_chain(&mut self, chain: &[SegmentHandle]) -> Result<()>;

    /// Whether a submitted chain is still on the wire.
    fn is_transmitting(&mut self) -> Result<bool>;

    /// Release a segment handle.
    fn release_segment(&mut self, handle: SegmentHandle) -> Result<()>;
}
