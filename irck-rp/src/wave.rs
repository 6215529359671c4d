//! Waveform synthesis
//!
//! Expands a canonical code into hardware waveform segments: a carrier
//! burst per distinct mark duration, a flat silence per distinct space
//! duration, and an ordered chain of handles mirroring the code
//! element-for-element. Identical durations share one segment, so a code
//! with `k` distinct marks and `m` distinct spaces costs exactly `k + m`
//! segments no matter how long it is.

use std::collections::HashMap;

use irck_common::{Code, PulseKind, Result};
use tracing::warn;

use crate::hal::{OutputLine, SegmentHandle, WaveStep};

/// Square-wave step train approximating the carrier for one mark.
///
/// Cycle boundaries are targeted cumulatively (`target = round((c+1) *
/// period)`) so the on+off total tracks the ideal duration instead of
/// compounding per-cycle rounding error.
pub fn carrier_steps(carrier_khz: f64, micros: f64) -> Vec<WaveStep> {
    let period = 1000.0 / carrier_khz;
    let cycles = (micros / period).round() as u64;
    let on = (period / 2.0).round() as i64;

    let mut steps = Vec::with_capacity(cycles as usize * 2);
    let mut elapsed: i64 = 0;
    for c in 0..cycles {
        let target = ((c + 1) as f64 * period).round() as i64;
        elapsed += on;
        let off = (target - elapsed).max(0);
        elapsed += off;
        steps.push(WaveStep::on(on as u32));
        steps.push(WaveStep::off(off as u32));
    }
    steps
}

/// Single flat step spanning one space.
pub fn silence_steps(micros: f64) -> Vec<WaveStep> {
    vec![WaveStep::off(micros.round() as u32)]
}

/// A synthesized chain: playback order plus the distinct handles created
/// for it.
///
/// The chain owns its handles for the duration of one playback call;
/// [`SegmentChain::release`] must run on every exit path once synthesis
/// succeeded.
#[derive(Debug)]
pub struct SegmentChain {
    order: Vec<SegmentHandle>,
    created: Vec<SegmentHandle>,
}

impl SegmentChain {
    /// Handles in code order, one per pulse.
    pub fn order(&self) -> &[SegmentHandle] {
        &self.order
    }

    /// Distinct handles created for this chain.
    pub fn created(&self) -> &[SegmentHandle] {
        &self.created
    }

    /// Release every created handle exactly once.
    ///
    /// Release failures are logged and skipped; one stuck handle must not
    /// leak the rest.
    pub fn release(self, line: &mut dyn OutputLine) {
        for handle in self.created {
            if let Err(e) = line.release_segment(handle) {
                warn!("failed to release segment {}: {}", handle.0, e);
            }
        }
    }
}

/// Synthesize the chain for a code.
///
/// On a mid-synthesis failure every handle created so far is released
/// before the error propagates.
pub fn synthesize(
    line: &mut dyn OutputLine,
    code: &Code,
    carrier_khz: f64,
) -> Result<SegmentChain> {
    let mut marks: HashMap<u64, SegmentHandle> = HashMap::new();
    let mut spaces: HashMap<u64, SegmentHandle> = HashMap::new();
    let mut chain = SegmentChain {
        order: Vec::with_capacity(code.len()),
        created: Vec::new(),
    };

    for pulse in code.pulses() {
        let key = (pulse.micros * 100.0).round() as u64;
        let interned = match pulse.kind {
            PulseKind::Mark => marks.get(&key).copied(),
            PulseKind::Space => spaces.get(&key).copied(),
        };
        let handle = match interned {
            Some(handle) => handle,
            None => {
                let steps = match pulse.kind {
                    PulseKind::Mark => carrier_steps(carrier_khz, pulse.micros),
                    PulseKind::Space => silence_steps(pulse.micros),
                };
                match line.create_segment(&steps) {
                    Ok(handle) => {
                        match pulse.kind {
                            PulseKind::Mark => marks.insert(key, handle),
                            PulseKind::Space => spaces.insert(key, handle),
                        };
                        chain.created.push(handle);
                        handle
                    }
                    Err(e) => {
                        chain.release(line);
                        return Err(e);
                    }
                }
            }
        };
        chain.order.push(handle);
    }

    Ok(chain)
}
