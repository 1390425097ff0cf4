//! Actor Gate - network front door for message-passing actors.
//!
//! A [`Gate`] accepts raw TCP or WebSocket clients, gives each one a
//! [`SessionId`], reports client traffic to the owning actor's [`Mailbox`]
//! and writes the actor's responses back to the right connection.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   accept / upgrade   ┌──────────────────────────┐
//! │   Clients   │ ───────────────────► │ Listener (admission cap) │
//! └─────────────┘                      └────────────┬─────────────┘
//!        ▲                                          │ register
//!        │ frames / text                            ▼
//! ┌──────┴──────┐       write / close      ┌──────────────────┐
//! │   Backend   │ ◄─────────────────────── │ SessionRegistry  │
//! │ TCP │  WS   │                          └──────────────────┘
//! └──────┬──────┘                                   ▲
//!        │ ON_OPEN / ON_MESSAGE / ON_CLOSE / ON_PONG │ WRITE / KICK
//!        ▼                                          │
//! ┌─────────────────────────────────────────────────┴────────┐
//! │                    Actor (Mailbox + GateHandle)          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Transports
//!
//! | Transport | Selected by | Wire format |
//! |-----------|-------------|-------------|
//! | Raw TCP | no upgrade path | `[len: u16 BE][payload]` both ways |
//! | WebSocket | `path = "/ws"` | text messages |
//!
//! # Quick Start
//!
//! ```no_run
//! use actor_gate::{Gate, GateConfig, GateEvent, GateHandle, Result};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (events_tx, mut events) = mpsc::unbounded_channel();
//!     let gate = GateHandle::spawn(Gate::new(events_tx));
//!     gate.open(GateConfig::new("127.0.0.1:8000")).await?;
//!
//!     // Echo every message back to its sender
//!     while let Some(event) = events.recv().await {
//!         if let GateEvent::OnMessage { session, payload } = event {
//!             gate.write(session, payload).await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`gate`] | [`Gate`], [`GateConfig`], [`GateHandle`], registry |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | [`SessionId`] and its allocator |
//! | [`protocol`] | Framing codec, events, control commands |
//! | [`transport`] | Listeners, backends, buffer pool |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Gate core, configuration and actor control surface.
pub mod gate;

/// Type-safe session identifiers.
pub mod identifiers;

/// Framing codec, events and control commands.
pub mod protocol;

/// Sockets, backends and buffers.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Gate types
pub use gate::{
    FnMailbox, Gate, GateBuilder, GateConfig, GateHandle, Mailbox, OriginCheck, SessionRegistry,
    Transport,
};

// Protocol types
pub use protocol::{ControlCommand, EventKind, GateEvent};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::SessionId;
