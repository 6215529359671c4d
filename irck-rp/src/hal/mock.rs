//! Deterministic in-process hardware backend
//!
//! Drives the codec with scripted line events and records every output
//! interaction so tests can assert on segment bookkeeping. Also backs the
//! `sim` demo backend of the CLI, where a scripted "operator" presses keys.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use irck_common::{Error, Result};
use tokio::sync::mpsc;

use super::{EdgeKind, EdgeSource, LineEvent, OutputLine, SegmentHandle, WaveStep};

#[derive(Debug, Default)]
struct EdgeState {
    glitch_us: Option<u32>,
    watchdog_ms: Option<u32>,
    watchdog_arms: u32,
    subscriptions: u32,
    cancels: u32,
}

/// Scripted edge source: each subscription replays the next scripted burst
/// of events, then closes its channel.
pub struct MockEdgeSource {
    bursts: VecDeque<Vec<LineEvent>>,
    state: Arc<Mutex<EdgeState>>,
}

impl MockEdgeSource {
    /// A source whose successive subscriptions replay `bursts` in order.
    pub fn with_bursts(bursts: Vec<Vec<LineEvent>>) -> Self {
        Self {
            bursts: bursts.into(),
            state: Arc::new(Mutex::new(EdgeState::default())),
        }
    }

    /// Inspection handle that outlives the source.
    pub fn probe(&self) -> EdgeProbe {
        EdgeProbe(Arc::clone(&self.state))
    }
}

impl EdgeSource for MockEdgeSource {
    fn configure(&mut self, glitch_us: u32) -> Result<()> {
        self.state.lock().unwrap().glitch_us = Some(glitch_us);
        Ok(())
    }

    fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<LineEvent>> {
        self.state.lock().unwrap().subscriptions += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(burst) = self.bursts.pop_front() {
            for event in burst {
                // Receiver is in hand; unbounded send cannot fail here.
                let _ = tx.send(event);
            }
        }
        // Sender dropped: the channel closes once the burst is drained.
        Ok(rx)
    }

    fn set_watchdog(&mut self, timeout_ms: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.watchdog_ms = Some(timeout_ms);
        state.watchdog_arms += 1;
        Ok(())
    }

    fn clear_watchdog(&mut self) -> Result<()> {
        self.state.lock().unwrap().watchdog_ms = None;
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        self.state.lock().unwrap().cancels += 1;
        Ok(())
    }
}

/// Shared view into a [`MockEdgeSource`]'s recorded state.
#[derive(Clone)]
pub struct EdgeProbe(Arc<Mutex<EdgeState>>);

impl EdgeProbe {
    pub fn glitch_us(&self) -> Option<u32> {
        self.0.lock().unwrap().glitch_us
    }

    pub fn watchdog_armed(&self) -> bool {
        self.0.lock().unwrap().watchdog_ms.is_some()
    }

    pub fn watchdog_arms(&self) -> u32 {
        self.0.lock().unwrap().watchdog_arms
    }

    pub fn subscriptions(&self) -> u32 {
        self.0.lock().unwrap().subscriptions
    }

    pub fn cancels(&self) -> u32 {
        self.0.lock().unwrap().cancels
    }
}

/// Build one key-press burst: an opening edge at `start_tick_us` (whose
/// gap from the previous activity starts the code), one edge per gap, and
/// a closing watchdog timeout.
pub fn press(start_tick_us: u64, gaps_us: &[u64]) -> Vec<LineEvent> {
    let mut events = Vec::with_capacity(gaps_us.len() + 2);
    let mut tick = start_tick_us;
    let mut kind = EdgeKind::Falling;
    events.push(LineEvent::Edge { kind, tick_us: tick });
    for &gap in gaps_us {
        tick += gap;
        kind = match kind {
            EdgeKind::Falling => EdgeKind::Rising,
            EdgeKind::Rising => EdgeKind::Falling,
        };
        events.push(LineEvent::Edge { kind, tick_us: tick });
    }
    events.push(LineEvent::Timeout {
        tick_us: tick + 130_000,
    });
    events
}

/// Deterministic NEC-shaped demo gaps (header, 32 bits, trailer) with a
/// little per-position jitter so normalization has something to do.
pub fn demo_gaps(bits: u32) -> Vec<u64> {
    let mut gaps = vec![9000, 4500];
    for i in 0..32 {
        let jitter = (i % 7) as u64;
        gaps.push(560 + jitter); // bit mark
        if bits >> i & 1 == 1 {
            gaps.push(1690 - jitter);
        } else {
            gaps.push(560 + (i % 5) as u64);
        }
    }
    gaps.push(562); // trailer mark
    gaps
}

#[derive(Debug, Default)]
struct OutputState {
    output_mode: bool,
    next_id: u32,
    all: HashMap<u32, Vec<WaveStep>>,
    live: HashSet<u32>,
    released: Vec<u32>,
    chains: Vec<Vec<u32>>,
    busy_polls_per_submit: u32,
    busy_remaining: u32,
}

/// Recording output line with a configurable transmission length.
pub struct MockOutputLine {
    state: Arc<Mutex<OutputState>>,
}

impl MockOutputLine {
    pub fn new() -> Self {
        Self::busy_for(0)
    }

    /// A line whose submitted chains stay "transmitting" for `polls`
    /// consecutive busy-flag reads.
    pub fn busy_for(polls: u32) -> Self {
        let state = OutputState {
            busy_polls_per_submit: polls,
            ..OutputState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Inspection handle that outlives the line.
    pub fn probe(&self) -> OutputProbe {
        OutputProbe(Arc::clone(&self.state))
    }
}

impl Default for MockOutputLine {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputLine for MockOutputLine {
    fn set_output_mode(&mut self) -> Result<()> {
        self.state.lock().unwrap().output_mode = true;
        Ok(())
    }

    fn create_segment(&mut self, steps: &[WaveStep]) -> Result<SegmentHandle> {
        let mut state = self.state.lock().unwrap();
        if !state.output_mode {
            return Err(Error::Hardware("line not in output mode".to_string()));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.all.insert(id, steps.to_vec());
        state.live.insert(id);
        Ok(SegmentHandle(id))
    }

    fn submit_chain(&mut self, chain: &[SegmentHandle]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.busy_remaining > 0 {
            return Err(Error::HardwareBusy);
        }
        for handle in chain {
            if !state.live.contains(&handle.0) {
                return Err(Error::Hardware(format!(
                    "chain references unknown segment {}",
                    handle.0
                )));
            }
        }
        state.chains.push(chain.iter().map(|h| h.0).collect());
        state.busy_remaining = state.busy_polls_per_submit;
        Ok(())
    }

    fn is_transmitting(&mut self) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.busy_remaining > 0 {
            state.busy_remaining -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn release_segment(&mut self, handle: SegmentHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.live.remove(&handle.0) {
            return Err(Error::Hardware(format!(
                "release of unknown segment {}",
                handle.0
            )));
        }
        state.released.push(handle.0);
        Ok(())
    }
}

/// Shared view into a [`MockOutputLine`]'s recorded state.
#[derive(Clone)]
pub struct OutputProbe(Arc<Mutex<OutputState>>);

impl OutputProbe {
    /// Total segments ever created.
    pub fn created_count(&self) -> usize {
        self.0.lock().unwrap().all.len()
    }

    /// Segments created and not yet released.
    pub fn live_count(&self) -> usize {
        self.0.lock().unwrap().live.len()
    }

    /// Release calls that succeeded, in order.
    pub fn released(&self) -> Vec<u32> {
        self.0.lock().unwrap().released.clone()
    }

    /// Submitted chains as segment id sequences, in order.
    pub fn chains(&self) -> Vec<Vec<u32>> {
        self.0.lock().unwrap().chains.clone()
    }

    pub fn submit_count(&self) -> usize {
        self.0.lock().unwrap().chains.len()
    }

    /// The steps a segment was created with, released or not.
    pub fn steps_for(&self, handle: SegmentHandle) -> Option<Vec<WaveStep>> {
        self.0.lock().unwrap().all.get(&handle.0).cloned()
    }
}
