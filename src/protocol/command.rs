//! Control commands accepted by the gate.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `Open` | Bind the listener and start accepting sessions |
//! | `Kick` | Tear down one session |
//! | `Shutdown` | Stop accepting and tear down every session |

// ============================================================================
// Imports
// ============================================================================

use crate::gate::GateConfig;
use crate::identifiers::SessionId;

// ============================================================================
// ControlCommand
// ============================================================================

/// A control operation for the gate actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Bind the listener described by the config.
    Open(GateConfig),
    /// Force a session's teardown. Unknown ids are ignored.
    Kick(SessionId),
    /// Stop the listener and kick all sessions.
    Shutdown,
}

impl ControlCommand {
    /// Returns the command name for logging.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Open(_) => "open",
            Self::Kick(_) => "kick",
            Self::Shutdown => "shutdown",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
