//! Integration tests for the record path
//!
//! Drives full recording sessions through the scripted edge backend and
//! asserts on per-command outcomes, on-disk library contents, and
//! watchdog/subscription cleanup.

use std::path::PathBuf;

use irck_common::events::EventBus;
use irck_common::{Code, PulseKind};
use irck_rp::config::TomlConfig;
use irck_rp::hal::mock::{press, EdgeProbe, MockEdgeSource, MockOutputLine};
use irck_rp::hal::LineEvent;
use irck_rp::{store, CommandOutcome, Session};

fn session_with(bursts: Vec<Vec<LineEvent>>, library_path: PathBuf) -> (Session, EdgeProbe) {
    let edges = MockEdgeSource::with_bursts(bursts);
    let probe = edges.probe();
    let output = MockOutputLine::new();
    let config = TomlConfig {
        library_path,
        ..TomlConfig::default()
    };
    let session = Session::new(
        config,
        Box::new(edges),
        Box::new(output),
        EventBus::new(64),
    )
    .unwrap();
    (session, probe)
}

/// Header, five bits, trailer: 11 gaps, comfortably past the short-code
/// threshold.
const PRESS_A: [u64; 11] = [9000, 4500, 600, 540, 620, 560, 590, 1660, 620, 1690, 615];

/// The same key a second time, drifted 10-20 µs the way a second press
/// reads on real hardware.
const PRESS_B: [u64; 11] = [9010, 4510, 610, 550, 630, 570, 600, 1670, 630, 1700, 625];

#[tokio::test]
async fn test_two_command_session_normalizes_across_library() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("codes.json");
    let (mut session, probe) = session_with(
        vec![press(250_000, &PRESS_A), press(250_000, &PRESS_B)],
        path.clone(),
    );

    let commands = vec!["cool26".to_string(), "off".to_string()];
    let outcomes = session.record(&commands).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| matches!(
        o,
        CommandOutcome::Captured { pulses: 11, .. }
    )));

    // One subscription per command, nothing left armed, glitch filter
    // cleared on teardown.
    assert_eq!(probe.subscriptions(), 2);
    assert!(!probe.watchdog_armed());
    assert_eq!(probe.glitch_us(), Some(0));

    // Cross-library normalization converged both presses onto the same
    // canonical alphabet: the two stored codes are identical.
    let library = store::load(&path).await.unwrap();
    let names: Vec<&str> = library.commands().collect();
    assert_eq!(names, vec!["cool26", "off"]);
    let expected = Code::from_gaps(&[
        9005.0, 4505.0, 614.0, 555.0, 614.0, 555.0, 614.0, 1680.0, 614.0, 1680.0, 614.0,
    ]);
    assert_eq!(library.get("cool26").unwrap(), &expected);
    assert_eq!(library.get("off").unwrap(), &expected);
}

#[tokio::test]
async fn test_single_code_stores_per_code_canonical_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("codes.json");
    let (mut session, _) = session_with(vec![press(250_000, &PRESS_A)], path.clone());

    session.record(&["cool26".to_string()]).await.unwrap();

    let library = store::load(&path).await.unwrap();
    let code = library.get("cool26").unwrap();
    assert_eq!(
        code.durations(PulseKind::Mark),
        vec![9000.0, 609.0, 609.0, 609.0, 609.0, 609.0]
    );
    assert_eq!(
        code.durations(PulseKind::Space),
        vec![4500.0, 550.0, 550.0, 1675.0, 1675.0]
    );
}

#[tokio::test]
async fn test_short_press_retries_on_same_subscription() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("codes.json");

    // One burst: a 4-pulse bounce ends in a timeout, then the real press.
    let mut burst = press(250_000, &[9000, 4500, 600, 540]);
    let retry_start = 250_000 + 9000 + 4500 + 600 + 540 + 400_000;
    burst.extend(press(retry_start, &PRESS_A));
    let (mut session, probe) = session_with(vec![burst], path.clone());

    let outcomes = session.record(&["cool26".to_string()]).await.unwrap();
    assert_eq!(
        outcomes,
        vec![CommandOutcome::Captured {
            command: "cool26".to_string(),
            pulses: 11
        }]
    );
    // The bounce did not cost a re-subscription.
    assert_eq!(probe.subscriptions(), 1);

    let library = store::load(&path).await.unwrap();
    assert!(library.contains("cool26"));
}

#[tokio::test]
async fn test_rerecording_overwrites_command_and_rotates_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("codes.json");

    let (mut session, _) = session_with(vec![press(250_000, &PRESS_A)], path.clone());
    session.record(&["cool26".to_string()]).await.unwrap();
    drop(session);

    let (mut session, _) = session_with(vec![press(250_000, &PRESS_B)], path.clone());
    session.record(&["cool26".to_string()]).await.unwrap();

    // Still one command, new capture, previous generation in the backup.
    let library = store::load(&path).await.unwrap();
    assert_eq!(library.len(), 1);
    let backup = store::load(&dir.path().join("codes.json.bak")).await.unwrap();
    assert_eq!(
        backup.get("cool26").unwrap().durations(PulseKind::Mark)[0],
        9000.0
    );
    assert_eq!(
        library.get("cool26").unwrap().durations(PulseKind::Mark)[0],
        9010.0
    );
}

#[tokio::test]
async fn test_cancelled_mid_session_keeps_earlier_captures() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("codes.json");

    // First command captures; the second subscription dies immediately.
    let (mut session, probe) = session_with(
        vec![press(250_000, &PRESS_A), Vec::new()],
        path.clone(),
    );

    let commands = vec!["cool26".to_string(), "off".to_string()];
    let outcomes = session.record(&commands).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0], CommandOutcome::Captured { .. }));
    assert!(matches!(outcomes[1], CommandOutcome::Cancelled { .. }));
    assert!(!probe.watchdog_armed());

    // The successful capture still reached the library.
    let library = store::load(&path).await.unwrap();
    assert!(library.contains("cool26"));
    assert!(!library.contains("off"));
}
