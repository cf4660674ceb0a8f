//! The timeout rule from §4.6 "Cancellation / timeout", driven by a real
//! `tokio` timer rather than a stubbed clock, matching `is_overdue`'s
//! contract against actual wall-clock elapse.

use concord_connection::{Connection, ConnectionEvent};
use concord_team::{Team, TeamConfig};
use std::time::Duration;

#[tokio::test]
async fn connection_becomes_overdue_only_after_its_configured_timeout_elapses() {
    let config = TeamConfig::new(Duration::from_millis(50)).unwrap();
    let (team, _) = Team::create(config, "acme", "alice", "Alice");
    let mut conn = Connection::new_device(team);
    conn.start();

    assert!(!conn.is_overdue());

    tokio::time::sleep(Duration::from_millis(75)).await;

    assert!(conn.is_overdue());
}

#[tokio::test]
async fn timed_out_disconnects_a_connection_whose_deadline_has_elapsed() {
    let config = TeamConfig::new(Duration::from_millis(50)).unwrap();
    let (team, _) = Team::create(config, "acme", "alice", "Alice");
    let mut conn = Connection::new_device(team);
    conn.start();

    tokio::time::sleep(Duration::from_millis(75)).await;
    assert!(conn.is_overdue());

    let (_messages, events) = conn.timed_out();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::Disconnected)));
}
