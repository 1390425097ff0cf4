//! Type-safe session identifiers.
//!
//! Session ids are allocated by the gate with a lock-free counter starting
//! at 1. They are never reused within one gate, and gaps are expected when
//! an allocated id is discarded (for example after a failed upgrade).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

// ============================================================================
// SessionId
// ============================================================================

/// Handle for one client connection owned by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(NonZeroU32);

impl SessionId {
    /// Creates a session id from a raw value.
    ///
    /// Returns `None` for 0, which is never allocated.
    #[inline]
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match NonZeroU32::new(value) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SessionId> for u32 {
    #[inline]
    fn from(id: SessionId) -> Self {
        id.as_u32()
    }
}

// ============================================================================
// SessionIdAllocator
// ============================================================================

/// Monotonic session id source.
///
/// Each gate owns one allocator, so ids are unique per gate.
#[derive(Debug, Default)]
pub struct SessionIdAllocator {
    last: AtomicU32,
}

impl SessionIdAllocator {
    /// Creates an allocator whose first id is 1.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU32::new(0),
        }
    }

    /// Allocates the next id.
    ///
    /// Skips 0 if the counter ever wraps around.
    pub fn next(&self) -> SessionId {
        loop {
            let value = self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if let Some(id) = SessionId::from_u32(value) {
                return id;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
