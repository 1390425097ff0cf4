//! The gate: session registry, configuration and actor control surface.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Gate`] | Session lifecycle, write path, listener ownership |
//! | [`GateBuilder`] | Origin check and buffer sizing |
//! | [`GateConfig`] | Listen address, client cap, upgrade path |
//! | [`GateHandle`] | Actor-style OPEN / KICK / WRITE surface |
//! | [`Mailbox`] | Destination for gate events |
//! | [`SessionRegistry`] | Concurrency-safe session map |
//!
//! # Session Lifecycle
//!
//! ```text
//! Allocated ──► Registered ──► Active ──► Kicked
//!     │
//!     └──► discarded (failed upgrade, never visible)
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Listener configuration.
pub mod config;

/// Gate core.
pub mod core;

/// Event delivery.
pub mod mailbox;

/// Session registry.
pub mod registry;

/// Actor control surface.
pub mod service;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{GateConfig, Transport};
pub use self::core::{Gate, GateBuilder, OriginCheck};
pub use mailbox::{FnMailbox, Mailbox};
pub use registry::SessionRegistry;
pub use service::GateHandle;
