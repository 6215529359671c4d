//! Timestamp and duration utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Render a microsecond duration for logs and prompts.
///
/// Sub-millisecond values keep microsecond units; everything else reads in
/// milliseconds with one decimal.
pub fn format_micros(micros: f64) -> String {
    if micros < 1000.0 {
        format!("{micros:.0} µs")
    } else {
        format!("{:.1} ms", micros / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(130), Duration::from_millis(130));
        assert_eq!(millis_to_duration(0), Duration::ZERO);
    }

    #[test]
    fn test_format_micros_sub_millisecond() {
        assert_eq!(format_micros(609.0), "609 µs");
    }

    #[test]
    fn test_format_micros_milliseconds() {
        assert_eq!(format_micros(9000.0), "9.0 ms");
        assert_eq!(format_micros(130_000.0), "130.0 ms");
    }
}
