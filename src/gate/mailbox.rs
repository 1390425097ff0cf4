//! Delivery of gate events to the owning actor.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use tracing::trace;

use crate::protocol::GateEvent;

// ============================================================================
// Mailbox
// ============================================================================

/// Destination for [`GateEvent`]s.
///
/// Notifications are one-way: `notify` must not block.
pub trait Mailbox: Send + Sync + 'static {
    /// Delivers one event.
    fn notify(&self, event: GateEvent);
}

impl Mailbox for mpsc::UnboundedSender<GateEvent> {
    fn notify(&self, event: GateEvent) {
        if let Err(e) = self.send(event) {
            trace!(
                session = %e.0.session(),
                kind = ?e.0.kind(),
                "Mailbox closed, event dropped"
            );
        }
    }
}

/// Adapts a closure into a [`Mailbox`].
pub struct FnMailbox<F>(pub F);

impl<F> Mailbox for FnMailbox<F>
where
    F: Fn(GateEvent) + Send + Sync + 'static,
{
    fn notify(&self, event: GateEvent) {
        (self.0)(event);
    }
}

// ============================================================================
// Tests
// ============================================================================
