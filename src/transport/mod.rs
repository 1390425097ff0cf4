//! Network transport layer.
//!
//! This module owns the sockets: listeners, per-connection backends and the
//! buffers they read and write through.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────────┐
//!   TCP client ───►│ tcp_accept_loop      │──► TcpBackend + TcpReadLoop
//!                  └──────────────────────┘
//!                  ┌──────────────────────┐
//!   WS client  ───►│ ws_accept_loop       │──► WebSocketBackend + WebSocket
//!                  └──────────────────────┘
//!                              │
//!                              ▼
//!                   SessionRegistry (dyn Backend)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backend` | Transport-agnostic `Backend` trait |
//! | `pool` | Reusable read/write buffers |
//! | `server` | Accept loops and admission control |
//! | `tcp` | Length-prefixed TCP backend |
//! | `websocket` | WebSocket connection and backend adapter |

// ============================================================================
// Submodules
// ============================================================================

/// Transport-agnostic session backend.
pub mod backend;

/// Reusable read/write buffers.
pub mod pool;

/// Accept loops and admission control.
pub(crate) mod server;

/// Raw TCP backend.
pub mod tcp;

/// WebSocket connection and backend adapter.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::Backend;
pub use pool::{BufferPool, BufferedReader, BufferedWriter};
pub use tcp::TcpBackend;
pub use websocket::{WebSocket, WebSocketBackend, WebSocketHandler};
