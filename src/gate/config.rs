//! Gate listener configuration.
//!
//! # Example
//!
//! ```ignore
//! use actor_gate::GateConfig;
//!
//! // Raw TCP, at most 1000 clients
//! let tcp = GateConfig::new("0.0.0.0:8000").with_max_clients(1000);
//!
//! // WebSocket upgrades at /ws, unlimited clients
//! let ws = GateConfig::new("0.0.0.0:8001").with_path("/ws");
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// GateConfig
// ============================================================================

/// Listener settings, fixed for a gate's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Address to listen on, e.g. `127.0.0.1:8000`.
    pub address: String,

    /// Maximum live clients. 0 means unlimited.
    #[serde(default)]
    pub max_clients: u32,

    /// WebSocket upgrade path. Absent or empty selects raw TCP.
    #[serde(default)]
    pub path: Option<String>,
}

// ============================================================================
// Transport
// ============================================================================

/// Transport selected by a [`GateConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Length-prefixed raw TCP.
    Tcp,
    /// WebSocket upgrades at `path`.
    WebSocket {
        /// Upgrade path.
        path: String,
    },
}

impl Transport {
    /// Returns `true` for raw TCP.
    #[inline]
    #[must_use]
    pub fn is_tcp(&self) -> bool {
        matches!(self, Self::Tcp)
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl GateConfig {
    /// Creates a raw TCP config with no client limit.
    #[inline]
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            max_clients: 0,
            path: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl GateConfig {
    /// Sets the client limit (0 = unlimited).
    #[inline]
    #[must_use]
    pub fn with_max_clients(mut self, max_clients: u32) -> Self {
        self.max_clients = max_clients;
        self
    }

    /// Selects WebSocket transport at `path`.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl GateConfig {
    /// Returns the transport this config selects.
    #[must_use]
    pub fn transport(&self) -> Transport {
        match self.path.as_deref() {
            Some(path) if !path.is_empty() => Transport::WebSocket {
                path: path.to_owned(),
            },
            _ => Transport::Tcp,
        }
    }

    /// Validates the config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the address is empty or the path does not
    /// start with `/`.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(Error::config("listen address must not be empty"));
        }

        if let Transport::WebSocket { path } = self.transport()
            && !path.starts_with('/')
        {
            return Err(Error::config(format!(
                "upgrade path must start with '/': {path}"
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
