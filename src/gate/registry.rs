//! Session registry.
//!
//! Maps session ids to their backends and tracks the live client count.
//!
//! # Locking
//!
//! One reader/writer lock guards the whole map. Lookups take the shared
//! side, insertions and removals take the exclusive side. The lock is never
//! held while a backend writes or closes, so a slow client cannot stall
//! other sessions' registry access.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::Result;
use crate::identifiers::{SessionId, SessionIdAllocator};
use crate::transport::Backend;

// ============================================================================
// SessionRegistry
// ============================================================================

/// Concurrency-safe `SessionId → Backend` map.
pub struct SessionRegistry {
    /// Session id source.
    ids: SessionIdAllocator,
    /// Live sessions.
    sessions: RwLock<FxHashMap<SessionId, Arc<dyn Backend>>>,
    /// Admitted clients, compared against the client cap.
    live: AtomicU32,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: SessionIdAllocator::new(),
            sessions: RwLock::new(FxHashMap::default()),
            live: AtomicU32::new(0),
        }
    }

    /// Allocates a fresh session id without locking.
    #[inline]
    pub fn next_session(&self) -> SessionId {
        self.ids.next()
    }

    /// Registers a backend under `session`.
    pub fn add_backend(&self, session: SessionId, backend: Arc<dyn Backend>) {
        let previous = self.sessions.write().insert(session, backend);
        debug_assert!(previous.is_none(), "session {session} registered twice");
        trace!(session = %session, "Backend registered");
    }

    /// Counts one more admitted client.
    ///
    /// Not atomic with the capacity check that precedes it.
    #[inline]
    pub fn admit(&self) {
        self.live.fetch_add(1, Ordering::AcqRel);
    }

    /// Removes `session` and closes its backend.
    ///
    /// Returns `false` if the session was not registered; nothing else
    /// happens in that case.
    pub async fn kick(&self, session: SessionId) -> bool {
        let removed = {
            let mut sessions = self.sessions.write();
            let removed = sessions.remove(&session);
            if removed.is_some() {
                let _ = self
                    .live
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
            }
            removed
        };

        match removed {
            Some(backend) => {
                backend.close().await;
                debug!(session = %session, "Session kicked");
                true
            }
            None => false,
        }
    }

    /// Writes to `session` if it is registered.
    ///
    /// Unknown sessions are ignored and the call succeeds.
    ///
    /// # Errors
    ///
    /// Returns the backend's write error.
    pub async fn write(&self, session: SessionId, data: &[u8]) -> Result<()> {
        let backend = self.sessions.read().get(&session).cloned();

        match backend {
            Some(backend) => backend.write(data).await,
            None => {
                trace!(session = %session, "Write to unknown session dropped");
                Ok(())
            }
        }
    }

    /// Removes every session and closes each backend.
    ///
    /// Returns the number of sessions closed.
    pub async fn kick_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut sessions = self.sessions.write();
            let drained: Vec<_> = sessions.drain().collect();
            let count = u32::try_from(drained.len()).unwrap_or(u32::MAX);
            let _ = self.live.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(count))
            });
            drained
        };

        let count = drained.len();
        for (session, backend) in drained {
            backend.close().await;
            trace!(session = %session, "Session closed during shutdown");
        }
        count
    }

    /// Returns `true` if `session` is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, session: SessionId) -> bool {
        self.sessions.read().contains_key(&session)
    }

    /// Number of registered sessions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if no session is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Current live client count used for admission.
    #[inline]
    #[must_use]
    pub fn live_clients(&self) -> u32 {
        self.live.load(Ordering::Acquire)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::Error;

    /// Backend that records what happened to it.
    #[derive(Default)]
    struct RecordingBackend {
        writes: Mutex<Vec<Vec<u8>>>,
        closes: AtomicUsize,
        fail_writes: bool,
    }

    #[async_trait]
    impl Backend for RecordingBackend {
        async fn write(&self, data: &[u8]) -> Result<()> {
            if self.fail_writes {
                return Err(Error::ConnectionClosed);
            }
            self.writes.lock().push(data.to_vec());
            Ok(())
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn register(registry: &SessionRegistry) -> (SessionId, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::default());
        let session = registry.next_session();
        registry.add_backend(session, backend.clone());
        registry.admit();
        (session, backend)
    }

    #[tokio::test]
    async fn test_write_reaches_backend() {
        let registry = SessionRegistry::new();
        let (session, backend) = register(&registry);

        registry.write(session, b"world").await.expect("write");
        assert_eq!(*backend.writes.lock(), vec![b"world".to_vec()]);
    }

    #[tokio::test]
    async fn test_write_to_unknown_session_is_silent() {
        let registry = SessionRegistry::new();
        let unknown = SessionId::from_u32(999).expect("non-zero");
        assert!(registry.write(unknown, b"lost").await.is_ok());
    }

    #[tokio::test]
    async fn test_write_error_propagates() {
        let registry = SessionRegistry::new();
        let backend = Arc::new(RecordingBackend {
            fail_writes: true,
            ..Default::default()
        });
        let session = registry.next_session();
        registry.add_backend(session, backend);

        let err = registry.write(session, b"x").await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_kick_is_idempotent() {
        let registry = SessionRegistry::new();
        let (session, backend) = register(&registry);
        assert_eq!(registry.live_clients(), 1);

        assert!(registry.kick(session).await);
        assert!(!registry.kick(session).await);
        assert!(!registry.kick(SessionId::from_u32(999).expect("non-zero")).await);

        assert_eq!(backend.closes.load(Ordering::SeqCst), 1);
        assert_eq!(registry.live_clients(), 0);
        assert!(!registry.contains(session));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_write_after_kick_is_dropped() {
        let registry = SessionRegistry::new();
        let (session, backend) = register(&registry);

        registry.kick(session).await;
        registry.write(session, b"late").await.expect("silent");
        assert!(backend.writes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_live_count_never_underflows() {
        let registry = SessionRegistry::new();
        let session = registry.next_session();
        registry.add_backend(session, Arc::new(RecordingBackend::default()));

        // Kicked before it was admitted
        registry.kick(session).await;
        assert_eq!(registry.live_clients(), 0);
    }

    #[tokio::test]
    async fn test_kick_all() {
        let registry = SessionRegistry::new();
        let backends: Vec<_> = (0..3).map(|_| register(&registry).1).collect();

        assert_eq!(registry.kick_all().await, 3);
        assert!(registry.is_empty());
        assert_eq!(registry.live_clients(), 0);
        for backend in backends {
            assert_eq!(backend.closes.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_kick_write() {
        let registry = Arc::new(SessionRegistry::new());

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let (session, backend) = register(&registry);
                    registry.write(session, b"a").await.expect("write");
                    let kicks = tokio::join!(registry.kick(session), registry.kick(session));
                    registry.write(session, b"b").await.expect("silent");
                    (kicks, backend)
                })
            })
            .collect();

        for task in tasks {
            let ((first, second), backend) = task.await.expect("task");
            assert!(first ^ second, "exactly one kick removes the session");
            assert_eq!(backend.closes.load(Ordering::SeqCst), 1);
            assert_eq!(*backend.writes.lock(), vec![b"a".to_vec()]);
        }

        assert!(registry.is_empty());
        assert_eq!(registry.live_clients(), 0);
    }
}
