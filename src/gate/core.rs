//! Gate core: session lifecycle and the write path.
//!
//! The [`Gate`] owns the session registry, the buffer pool and the
//! listener. It is cheap to clone; all clones share one state.
//!
//! # Example
//!
//! ```no_run
//! use actor_gate::{Gate, GateConfig, Result};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<()> {
//! let (events_tx, mut events) = mpsc::unbounded_channel();
//! let gate = Gate::new(events_tx);
//! gate.open(GateConfig::new("127.0.0.1:8000")).await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::GateEvent;
use crate::protocol::frame;
use crate::transport::pool::{BufferPool, DEFAULT_BUFFER_SIZE};
use crate::transport::server;
use crate::transport::{WebSocket, WebSocketHandler};

use super::config::{GateConfig, Transport};
use super::mailbox::Mailbox;
use super::registry::SessionRegistry;

// ============================================================================
// Types
// ============================================================================

/// Origin predicate for WebSocket upgrades: `(origin, host) -> allowed`.
pub type OriginCheck = Arc<dyn Fn(Option<&str>, &str) -> bool + Send + Sync>;

/// Listener state recorded by `open`.
struct Listening {
    transport: Transport,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
}

/// Shared state behind every [`Gate`] clone.
pub(crate) struct GateInner {
    /// Live sessions.
    pub(crate) registry: SessionRegistry,
    /// Buffers for TCP sessions.
    pub(crate) pool: Arc<BufferPool>,
    /// Event destination.
    mailbox: Arc<dyn Mailbox>,
    /// WebSocket origin predicate. `None` accepts all.
    origin_check: Option<OriginCheck>,
    /// Set once the gate is open.
    listening: Mutex<Option<Listening>>,
}

impl GateInner {
    /// Delivers an event to the owning actor.
    #[inline]
    pub(crate) fn notify(&self, event: GateEvent) {
        trace!(session = %event.session(), kind = ?event.kind(), "Event");
        self.mailbox.notify(event);
    }

    /// Removes and closes a session. Unknown ids are ignored.
    pub(crate) async fn kick(&self, session: SessionId) {
        if !self.registry.kick(session).await {
            debug!(session = %session, "Kick for unknown session ignored");
        }
    }

    fn check_origin(&self, origin: Option<&str>, host: &str) -> bool {
        self.origin_check
            .as_ref()
            .is_none_or(|check| check(origin, host))
    }

    fn transport(&self) -> Option<Transport> {
        self.listening.lock().as_ref().map(|l| l.transport.clone())
    }
}

// ============================================================================
// GateHandler
// ============================================================================

/// Forwards WebSocket callbacks to the gate's mailbox.
pub(crate) struct GateHandler {
    gate: Arc<GateInner>,
}

impl GateHandler {
    pub(crate) fn new(gate: Arc<GateInner>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl WebSocketHandler for GateHandler {
    fn check_origin(&self, origin: Option<&str>, host: &str) -> bool {
        self.gate.check_origin(origin, host)
    }

    async fn on_open(&self, ws: &WebSocket) {
        self.gate.notify(GateEvent::OnOpen {
            session: ws.session(),
        });
    }

    async fn on_message(&self, ws: &WebSocket, message: Vec<u8>) {
        self.gate.notify(GateEvent::OnMessage {
            session: ws.session(),
            payload: message,
        });
    }

    async fn on_close(&self, ws: &WebSocket, code: u16, reason: Vec<u8>) {
        let session = ws.session();
        self.gate.notify(GateEvent::OnClose {
            session,
            code,
            reason,
        });
        self.gate.kick(session).await;
    }

    async fn on_pong(&self, ws: &WebSocket, payload: Vec<u8>) {
        self.gate.notify(GateEvent::OnPong {
            session: ws.session(),
            payload,
        });
    }
}

// ============================================================================
// Gate
// ============================================================================

/// Network gate for one actor.
///
/// Accepts TCP or WebSocket clients, reports their traffic to a
/// [`Mailbox`], and writes actor responses back to them.
#[derive(Clone)]
pub struct Gate {
    inner: Arc<GateInner>,
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("local_addr", &self.local_addr())
            .field("sessions", &self.session_count())
            .field("live_clients", &self.live_clients())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Gate - Constructors
// ============================================================================

impl Gate {
    /// Creates a gate reporting to `mailbox` with default settings.
    #[must_use]
    pub fn new(mailbox: impl Mailbox) -> Self {
        Self::builder(mailbox).build()
    }

    /// Creates a builder for a gate reporting to `mailbox`.
    #[must_use]
    pub fn builder(mailbox: impl Mailbox) -> GateBuilder {
        GateBuilder {
            mailbox: Arc::new(mailbox),
            origin_check: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

// ============================================================================
// Gate - Control
// ============================================================================

impl Gate {
    /// Binds the listener and starts accepting clients.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 is used.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the config is invalid
    /// - [`Error::AlreadyOpen`] if the gate was opened before
    /// - [`Error::Bind`] if the address cannot be bound
    pub async fn open(&self, config: GateConfig) -> Result<SocketAddr> {
        config.validate()?;
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        let listener = server::bind(&config.address).await?;
        let local_addr = listener.local_addr()?;
        let transport = config.transport();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        {
            let mut listening = self.inner.listening.lock();
            if listening.is_some() {
                return Err(Error::AlreadyOpen);
            }
            *listening = Some(Listening {
                transport: transport.clone(),
                local_addr,
                shutdown: shutdown_tx,
            });
        }

        let gate = Arc::clone(&self.inner);
        match transport {
            Transport::Tcp => {
                info!(address = %local_addr, max_clients = config.max_clients, "TCP gate started");
                tokio::spawn(server::tcp_accept_loop(
                    gate,
                    listener,
                    config.max_clients,
                    shutdown_rx,
                ));
            }
            Transport::WebSocket { path } => {
                info!(address = %local_addr, path = %path, max_clients = config.max_clients, "WebSocket gate started");
                tokio::spawn(server::ws_accept_loop(
                    gate,
                    listener,
                    Arc::from(path),
                    config.max_clients,
                    shutdown_rx,
                ));
            }
        }

        Ok(local_addr)
    }

    /// Tears down a session. Unknown or already kicked ids are ignored.
    pub async fn kick(&self, session: SessionId) {
        self.inner.kick(session).await;
    }

    /// Stops accepting clients and kicks every live session.
    ///
    /// Returns the number of sessions closed.
    pub async fn shutdown(&self) -> usize {
        if let Some(listening) = self.inner.listening.lock().as_ref() {
            let _ = listening.shutdown.send(true);
        }

        let closed = self.inner.registry.kick_all().await;
        info!(closed, "Gate shut down");
        closed
    }
}

// ============================================================================
// Gate - Write Path
// ============================================================================

impl Gate {
    /// Sends one message to a session.
    ///
    /// Writes to unknown or kicked sessions succeed without effect.
    ///
    /// # Errors
    ///
    /// - [`Error::NotOpen`] before [`open`](Self::open)
    /// - [`Error::FrameTooLarge`] for TCP payloads over 65535 bytes
    /// - the backend's error if the write or flush fails
    pub async fn write(&self, session: SessionId, data: &[u8]) -> Result<()> {
        let transport = self.inner.transport().ok_or(Error::NotOpen)?;
        if transport.is_tcp() {
            frame::check_payload(data)?;
        }

        self.inner.registry.write(session, data).await
    }
}

// ============================================================================
// Gate - Introspection
// ============================================================================

impl Gate {
    /// Returns `true` once [`open`](Self::open) succeeded.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.listening.lock().is_some()
    }

    /// Returns the bound listen address, if open.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.listening.lock().as_ref().map(|l| l.local_addr)
    }

    /// Returns the transport selected at open.
    #[must_use]
    pub fn transport(&self) -> Option<Transport> {
        self.inner.transport()
    }

    /// Returns `true` if `session` is live.
    #[inline]
    #[must_use]
    pub fn contains(&self, session: SessionId) -> bool {
        self.inner.registry.contains(session)
    }

    /// Number of registered sessions.
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Live client count used for admission.
    #[inline]
    #[must_use]
    pub fn live_clients(&self) -> u32 {
        self.inner.registry.live_clients()
    }

    /// Idle `(read, write)` buffers held by the pool.
    #[must_use]
    pub fn idle_buffers(&self) -> (usize, usize) {
        (self.inner.pool.idle_readers(), self.inner.pool.idle_writers())
    }
}

// ============================================================================
// GateBuilder
// ============================================================================

/// Builder for a [`Gate`].
pub struct GateBuilder {
    mailbox: Arc<dyn Mailbox>,
    origin_check: Option<OriginCheck>,
    buffer_size: usize,
}

impl GateBuilder {
    /// Sets the WebSocket origin predicate.
    ///
    /// Without one every origin is accepted.
    #[must_use]
    pub fn origin_check<F>(mut self, check: F) -> Self
    where
        F: Fn(Option<&str>, &str) -> bool + Send + Sync + 'static,
    {
        self.origin_check = Some(Arc::new(check));
        self
    }

    /// Sets the per-direction buffer size for TCP sessions.
    #[inline]
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Builds the gate. It accepts nothing until opened.
    #[must_use]
    pub fn build(self) -> Gate {
        Gate {
            inner: Arc::new(GateInner {
                registry: SessionRegistry::new(),
                pool: Arc::new(BufferPool::with_buffer_size(self.buffer_size)),
                mailbox: self.mailbox,
                origin_check: self.origin_check,
                listening: Mutex::new(None),
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    fn gate() -> (Gate, mpsc::UnboundedReceiver<GateEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Gate::new(tx), rx)
    }

    #[tokio::test]
    async fn test_write_before_open() {
        let (gate, _events) = gate();
        let session = SessionId::from_u32(1).expect("non-zero");
        assert!(matches!(gate.write(session, b"x").await, Err(Error::NotOpen)));
    }

    #[tokio::test]
    async fn test_open_twice() {
        let (gate, _events) = gate();
        let addr = gate.open(GateConfig::new("127.0.0.1:0")).await.expect("open");
        assert!(addr.port() > 0);
        assert_eq!(gate.local_addr(), Some(addr));
        assert_eq!(gate.transport(), Some(Transport::Tcp));

        let again = gate.open(GateConfig::new("127.0.0.1:0")).await;
        assert!(matches!(again, Err(Error::AlreadyOpen)));
        gate.shutdown().await;
    }

    #[tokio::test]
    async fn test_open_invalid_config() {
        let (gate, _events) = gate();
        let result = gate.open(GateConfig::new("")).await;
        assert!(matches!(result, Err(Error::Config { .. })));
        assert!(!gate.is_open());
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let (gate, _events) = gate();
        let result = gate.open(GateConfig::new("not-an-address")).await;
        assert!(matches!(result, Err(Error::Bind { .. })));
        assert!(!gate.is_open());
    }

    #[tokio::test]
    async fn test_kick_unknown_session() {
        let (gate, mut events) = gate();
        gate.open(GateConfig::new("127.0.0.1:0")).await.expect("open");

        gate.kick(SessionId::from_u32(999).expect("non-zero")).await;
        assert!(events.try_recv().is_err());
        gate.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_tcp_write_rejected() {
        let (gate, _events) = gate();
        gate.open(GateConfig::new("127.0.0.1:0")).await.expect("open");

        let session = SessionId::from_u32(1).expect("non-zero");
        let payload = vec![0u8; frame::MAX_PAYLOAD_LEN + 1];
        let result = gate.write(session, &payload).await;
        assert!(matches!(result, Err(Error::FrameTooLarge { .. })));
        gate.shutdown().await;
    }

    #[test]
    fn test_origin_check_default_accepts() {
        let (tx, _rx) = mpsc::unbounded_channel::<GateEvent>();
        let open = Gate::new(tx.clone());
        assert!(open.inner.check_origin(Some("http://evil.example"), "localhost"));

        let strict = Gate::builder(tx)
            .origin_check(|origin, _host| origin == Some("http://good.example"))
            .build();
        assert!(strict.inner.check_origin(Some("http://good.example"), "localhost"));
        assert!(!strict.inner.check_origin(None, "localhost"));
    }
}
