//! Gate protocol types.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | Frame | Client ↔ Gate | Length-prefixed TCP message |
//! | `ControlCommand` | Actor → Gate | OPEN / KICK / SHUTDOWN |
//! | Write | Actor → Gate | Deliver a payload to a session |
//! | `GateEvent` | Gate → Actor | ON_OPEN / ON_MESSAGE / ON_CLOSE / ON_PONG |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Control commands |
//! | `event` | Event notifications |
//! | `frame` | TCP length-prefix codec |

// ============================================================================
// Submodules
// ============================================================================

/// Control commands.
pub mod command;

/// Event notifications.
pub mod event;

/// Length-prefixed TCP framing.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::ControlCommand;
pub use event::{EventKind, GateEvent};
