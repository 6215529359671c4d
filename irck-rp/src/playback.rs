//! Playback scheduling
//!
//! Emits a synthesized chain on the output line with correct timing
//! relative to an intended emission instant, blocks until the hardware
//! finishes transmitting, and releases every segment handle exactly once,
//! on success and on every failure path after synthesis.
//!
//! There is no catch-up compensation: a late start plays the full code
//! late, never truncated. One playback is in flight at a time per line;
//! concurrent callers must serialize.

use std::time::Duration;

use irck_common::{Code, Result};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::debug;

use crate::hal::{OutputLine, SegmentHandle};
use crate::wave;

/// Play one code on the output line.
///
/// If `emit_at` is still in the future the scheduler sleeps out the
/// difference after synthesizing; `None` emits immediately. After
/// submission the busy flag is polled every `busy_poll` until the chain
/// has left the wire.
pub async fn play_code(
    line: &mut dyn OutputLine,
    code: &Code,
    carrier_khz: f64,
    busy_poll: Duration,
    emit_at: Option<Instant>,
) -> Result<()> {
    let chain = wave::synthesize(line, code, carrier_khz)?;
    debug!(
        pulses = code.len(),
        segments = chain.created().len(),
        "chain synthesized"
    );

    let result = transmit(line, chain.order(), busy_poll, emit_at).await;
    chain.release(line);
    result
}

async fn transmit(
    line: &mut dyn OutputLine,
    order: &[SegmentHandle],
    busy_poll: Duration,
    emit_at: Option<Instant>,
) -> Result<()> {
    if let Some(at) = emit_at {
        let now = Instant::now();
        if at > now {
            debug!("sleeping {:?} until emission instant", at - now);
            sleep_until(at).await;
        }
    }

    line.submit_chain(order)?;
    while line.is_transmitting()? {
        sleep(busy_poll).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockOutputLine;
    use irck_common::Error;

    fn test_code() -> Code {
        Code::from_gaps(&[9000.0, 4500.0, 609.0, 550.0, 609.0, 1675.0, 609.0])
    }

    #[tokio::test]
    async fn test_play_submits_chain_and_releases_all_segments() {
        let mut line = MockOutputLine::busy_for(3);
        line.set_output_mode().unwrap();
        let probe = line.probe();

        play_code(&mut line, &test_code(), 38.0, Duration::from_millis(2), None)
            .await
            .unwrap();

        assert_eq!(probe.submit_count(), 1);
        assert_eq!(probe.chains()[0].len(), 7);
        assert_eq!(probe.live_count(), 0);
        // 2 distinct marks + 2 distinct spaces... plus the 1675 space: 5.
        assert_eq!(probe.released().len(), 5);
    }

    #[tokio::test]
    async fn test_busy_line_fails_but_still_releases() {
        let mut line = MockOutputLine::busy_for(2);
        line.set_output_mode().unwrap();
        let probe = line.probe();

        // Occupy the line, then immediately request another playback.
        let filler = wave::synthesize(&mut line, &test_code(), 38.0).unwrap();
        line.submit_chain(filler.order()).unwrap();

        let result = play_code(
            &mut line,
            &test_code(),
            38.0,
            Duration::from_millis(2),
            None,
        )
        .await;
        assert!(matches!(result, Err(Error::HardwareBusy)));

        filler.release(&mut line);
        // Both the filler's and the failed call's segments are gone.
        assert_eq!(probe.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_future_emission_instant_delays_submission() {
        let mut line = MockOutputLine::new();
        line.set_output_mode().unwrap();
        let probe = line.probe();

        let start = Instant::now();
        let emit_at = start + Duration::from_millis(500);
        play_code(
            &mut line,
            &test_code(),
            38.0,
            Duration::from_millis(2),
            Some(emit_at),
        )
        .await
        .unwrap();

        assert!(Instant::now() >= emit_at);
        assert_eq!(probe.submit_count(), 1);
    }

    #[tokio::test]
    async fn test_past_emission_instant_plays_immediately_in_full() {
        let mut line = MockOutputLine::new();
        line.set_output_mode().unwrap();
        let probe = line.probe();

        // Already elapsed by the time the scheduler compares it.
        let just_passed = Instant::now();
        play_code(
            &mut line,
            &test_code(),
            38.0,
            Duration::from_millis(2),
            Some(just_passed),
        )
        .await
        .unwrap();

        // Late start still plays the whole chain.
        assert_eq!(probe.chains()[0].len(), 7);
    }
}
