//! Transport-agnostic session backend.
//!
//! The session registry only ever sees this trait. TCP and WebSocket
//! connections both implement it.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;

// ============================================================================
// Backend
// ============================================================================

/// One live client connection.
///
/// # Contract
///
/// - `write` delivers one message. Concurrent calls on the same backend are
///   serialized internally so messages are never interleaved.
/// - `close` releases the connection's resources. It is called exactly once,
///   by the registry, after the session has been removed. It must not wait
///   for a pending `write` to drain; such a write fails instead.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Sends one message to the client and flushes it.
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Tears down the connection.
    async fn close(&self);
}

// ============================================================================
// Close Signal
// ============================================================================

/// Resolves once `closed` flips to `true`, or its sender is gone.
pub(crate) async fn until_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}
