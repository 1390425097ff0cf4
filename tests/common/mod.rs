//! Shared helpers for gate integration tests.

#![allow(dead_code)]

use std::time::Duration;

use actor_gate::{Gate, GateEvent, SessionId};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Window in which "nothing happens" is asserted.
pub const QUIET: Duration = Duration::from_millis(200);

/// Installs a test subscriber once. Set `RUST_LOG=actor_gate=trace` to see
/// gate logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Creates a gate wired to a channel mailbox.
pub fn gate() -> (Gate, mpsc::UnboundedReceiver<GateEvent>) {
    init_tracing();
    let (tx, rx) = mpsc::unbounded_channel();
    (Gate::new(tx), rx)
}

/// Waits for the next event.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<GateEvent>) -> GateEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("event within timeout")
        .expect("mailbox open")
}

/// Asserts that no event arrives for a short while.
pub async fn assert_no_event(events: &mut mpsc::UnboundedReceiver<GateEvent>) {
    if let Ok(Some(event)) = tokio::time::timeout(QUIET, events.recv()).await {
        panic!("unexpected event: {event:?}");
    }
}

/// Polls `condition` until it holds or the timeout expires.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {WAIT:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Session id from a raw value.
pub fn session(id: u32) -> SessionId {
    SessionId::from_u32(id).expect("non-zero")
}
