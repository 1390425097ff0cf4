//! Error types for the gate.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use actor_gate::{Gate, GateConfig, Result};
//!
//! async fn example(gate: &Gate) -> Result<()> {
//!     gate.open(GateConfig::new("127.0.0.1:8000")).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Bind`] |
//! | Lifecycle | [`Error::NotOpen`], [`Error::AlreadyOpen`], [`Error::GateStopped`] |
//! | Framing | [`Error::FrameTooLarge`], [`Error::InvalidPayload`] |
//! | Connection | [`Error::ConnectionClosed`] |
//! | External | [`Error::Io`], [`Error::WebSocket`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::protocol::frame::MAX_PAYLOAD_LEN;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a [`GateConfig`](crate::GateConfig) fails validation.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// The listen address could not be bound.
    ///
    /// Hosts treat this as fatal: a gate that cannot listen has no purpose.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Address from the configuration.
        address: String,
        /// Underlying socket error.
        #[source]
        source: IoError,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// A write arrived before the gate was opened.
    #[error("Gate is not open")]
    NotOpen,

    /// `OPEN` was issued twice on the same gate.
    #[error("Gate is already open")]
    AlreadyOpen,

    /// The gate service task has stopped.
    #[error("Gate service stopped")]
    GateStopped,

    // ========================================================================
    // Framing Errors
    // ========================================================================
    /// Payload does not fit the 16-bit length prefix.
    #[error("Frame payload of {len} bytes exceeds {max} bytes", max = MAX_PAYLOAD_LEN)]
    FrameTooLarge {
        /// Rejected payload length.
        len: usize,
    },

    /// Payload cannot be carried by the transport (e.g. non UTF-8 text).
    #[error("Invalid payload: {message}")]
    InvalidPayload {
        /// Description of the problem.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The connection was closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a bind error.
    #[inline]
    pub fn bind(address: impl Into<String>, source: IoError) -> Self {
        Self::Bind {
            address: address.into(),
            source,
        }
    }

    /// Creates a frame too large error.
    #[inline]
    pub fn frame_too_large(len: usize) -> Self {
        Self::FrameTooLarge { len }
    }

    /// Creates an invalid payload error.
    #[inline]
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error means the peer connection is unusable.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::Io(_) | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::config("address must not be empty");
        assert_eq!(
            err.to_string(),
            "Configuration error: address must not be empty"
        );
    }

    #[test]
    fn test_frame_too_large_display() {
        let err = Error::frame_too_large(70_000);
        assert_eq!(
            err.to_string(),
            "Frame payload of 70000 bytes exceeds 65535 bytes"
        );
    }

    #[test]
    fn test_bind_keeps_source() {
        let err = Error::bind("127.0.0.1:1", IoError::new(ErrorKind::AddrInUse, "in use"));
        assert!(err.to_string().starts_with("Failed to bind 127.0.0.1:1"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::Io(IoError::from(ErrorKind::BrokenPipe)).is_connection_error());
        assert!(!Error::NotOpen.is_connection_error());
    }

    #[test]
    fn test_from_io_error() {
        let err: Error = IoError::new(ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
