//! Event notifications sent from the gate to the owning actor.
//!
//! # Event Types
//!
//! | Event | Transport | Payload |
//! |-------|-----------|---------|
//! | `OnOpen` | WebSocket | none |
//! | `OnMessage` | TCP, WebSocket | message bytes |
//! | `OnClose` | WebSocket | close code, reason bytes |
//! | `OnPong` | WebSocket | pong payload |

// ============================================================================
// Imports
// ============================================================================

use crate::identifiers::SessionId;

// ============================================================================
// GateEvent
// ============================================================================

/// A one-way notification about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// A WebSocket session completed its handshake.
    OnOpen {
        /// Session that opened.
        session: SessionId,
    },

    /// A complete message arrived.
    OnMessage {
        /// Sending session.
        session: SessionId,
        /// Opaque payload.
        payload: Vec<u8>,
    },

    /// The WebSocket peer closed the connection.
    OnClose {
        /// Closed session.
        session: SessionId,
        /// Close status code (1006 when no close frame was received).
        code: u16,
        /// Close reason bytes.
        reason: Vec<u8>,
    },

    /// The WebSocket peer answered a ping.
    OnPong {
        /// Answering session.
        session: SessionId,
        /// Pong payload.
        payload: Vec<u8>,
    },
}

impl GateEvent {
    /// Returns the session this event is tagged with.
    #[inline]
    #[must_use]
    pub const fn session(&self) -> SessionId {
        match self {
            Self::OnOpen { session }
            | Self::OnMessage { session, .. }
            | Self::OnClose { session, .. }
            | Self::OnPong { session, .. } => *session,
        }
    }

    /// Returns the numeric event tag used by actor runtimes.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::OnOpen { .. } => EventKind::Open,
            Self::OnMessage { .. } => EventKind::Message,
            Self::OnClose { .. } => EventKind::Close,
            Self::OnPong { .. } => EventKind::Pong,
        }
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// Numeric event tags, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    /// `OnOpen`.
    Open = 0,
    /// `OnMessage`.
    Message = 1,
    /// `OnClose`.
    Close = 2,
    /// `OnPong`.
    Pong = 3,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: u32) -> SessionId {
        SessionId::from_u32(id).expect("non-zero")
    }

    #[test]
    fn test_event_session() {
        let event = GateEvent::OnClose {
            session: session(3),
            code: 1000,
            reason: b"bye".to_vec(),
        };
        assert_eq!(event.session(), session(3));
        assert_eq!(event.kind(), EventKind::Close);
    }

    #[test]
    fn test_event_kind_tags() {
        assert_eq!(EventKind::Open as u8, 0);
        assert_eq!(EventKind::Message as u8, 1);
        assert_eq!(EventKind::Close as u8, 2);
        assert_eq!(EventKind::Pong as u8, 3);

        let pong = GateEvent::OnPong {
            session: session(1),
            payload: Vec::new(),
        };
        assert_eq!(pong.kind(), EventKind::Pong);
    }
}
