//! WebSocket connection and its session backend adapter.
//!
//! [`WebSocket`] wraps an upgraded `tokio-tungstenite` stream and exposes the
//! small surface the gate needs: `start`, `send_text` and `close`. Incoming
//! traffic is reported through a [`WebSocketHandler`].
//!
//! # Event Loop
//!
//! [`WebSocket::start`] spawns one task per connection that:
//!
//! 1. Calls `on_open`
//! 2. Forwards text and binary messages to `on_message`
//! 3. Forwards pongs to `on_pong` (pings are answered by tungstenite)
//! 4. Calls `on_close` once when the peer closes or the stream fails
//!
//! A close initiated locally through [`WebSocket::close`] stops the loop
//! without calling `on_close`. It also abandons any send stuck on a client
//! that stopped reading, and gives the close handshake at most
//! [`CLOSE_TIMEOUT`] before the connection is dropped.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex as SyncMutex;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

use super::backend::{Backend, until_closed};

// ============================================================================
// Constants
// ============================================================================

/// Close code reported when the peer sent a close frame without a status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Close code reported when the stream ended without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Upper bound for sending the close frame on a local close.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Types
// ============================================================================

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

// ============================================================================
// WebSocketHandler
// ============================================================================

/// Callbacks for WebSocket connection events.
#[async_trait]
pub trait WebSocketHandler: Send + Sync + 'static {
    /// Decides whether an upgrade request from `origin` may proceed.
    ///
    /// Accepts every origin unless overridden.
    fn check_origin(&self, _origin: Option<&str>, _host: &str) -> bool {
        true
    }

    /// The event loop started.
    async fn on_open(&self, ws: &WebSocket);

    /// A text or binary message arrived.
    async fn on_message(&self, ws: &WebSocket, message: Vec<u8>);

    /// The peer closed the connection or the stream failed.
    async fn on_close(&self, ws: &WebSocket, code: u16, reason: Vec<u8>);

    /// A pong arrived.
    async fn on_pong(&self, ws: &WebSocket, payload: Vec<u8>);
}

// ============================================================================
// WebSocket
// ============================================================================

/// An upgraded WebSocket connection bound to a session.
pub struct WebSocket {
    /// Owning session.
    session: SessionId,
    /// Outgoing half; the mutex serializes writers.
    sink: Mutex<WsSink>,
    /// Incoming half, taken by the event loop on start.
    stream: SyncMutex<Option<WsStream>>,
    /// Event callbacks.
    handler: Arc<dyn WebSocketHandler>,
    /// Flips to `true` once a local close began.
    closed: watch::Sender<bool>,
}

impl WebSocket {
    /// Wraps an upgraded stream. Call [`start`](Self::start) to begin
    /// receiving events.
    #[must_use]
    pub fn new(
        session: SessionId,
        ws_stream: WebSocketStream<TcpStream>,
        handler: Arc<dyn WebSocketHandler>,
    ) -> Arc<Self> {
        let (sink, stream) = ws_stream.split();

        Arc::new(Self {
            session,
            sink: Mutex::new(sink),
            stream: SyncMutex::new(Some(stream)),
            handler,
            closed: watch::Sender::new(false),
        })
    }

    /// Returns the owning session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Spawns the event loop. Calling it again has no effect.
    pub fn start(self: &Arc<Self>) {
        let Some(stream) = self.stream.lock().take() else {
            warn!(session = %self.session, "WebSocket already started");
            return;
        };

        tokio::spawn(Arc::clone(self).run_event_loop(stream));
    }

    /// Sends `data` as one text message.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPayload`] if `data` is not UTF-8
    /// - [`Error::ConnectionClosed`] after a local close
    /// - [`Error::WebSocket`] if the send fails
    pub async fn send_text(&self, data: &[u8]) -> Result<()> {
        let text = String::from_utf8(data.to_vec())
            .map_err(|e| Error::invalid_payload(format!("text message is not UTF-8: {e}")))?;

        let mut closed = self.closed.subscribe();
        tokio::select! {
            biased;

            () = until_closed(&mut closed) => Err(Error::ConnectionClosed),

            result = self.send(Message::text(text)) => {
                result?;
                trace!(session = %self.session, len = data.len(), "Text message sent");
                Ok(())
            }
        }
    }

    async fn send(&self, message: Message) -> Result<()> {
        self.sink.lock().await.send(message).await?;
        Ok(())
    }

    /// Closes the connection with a status code and reason.
    ///
    /// Code 0 sends a close frame without a status. Only the first call has
    /// an effect.
    pub async fn close(&self, code: u16, reason: &[u8]) {
        if self.closed.send_replace(true) {
            return;
        }

        let frame = (code != 0).then(|| CloseFrame {
            code: CloseCode::from(code),
            reason: String::from_utf8_lossy(reason).into_owned().into(),
        });

        let handshake = async {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.send(Message::Close(frame)).await {
                trace!(session = %self.session, error = %e, "Close frame not sent");
            }
            let _ = sink.close().await;
        };

        // The socket itself goes away with the last reference to `self`
        if tokio::time::timeout(CLOSE_TIMEOUT, handshake).await.is_err() {
            debug!(session = %self.session, "Close handshake timed out");
        }

        debug!(session = %self.session, code, "WebSocket closed locally");
    }

    /// Event loop that reads until close.
    async fn run_event_loop(self: Arc<Self>, mut stream: WsStream) {
        let mut closed = self.closed.subscribe();
        self.handler.on_open(&self).await;

        let (code, reason) = loop {
            tokio::select! {
                () = until_closed(&mut closed) => {
                    debug!(session = %self.session, "Event loop stopped");
                    return;
                }

                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            self.handler.on_message(&self, text.as_bytes().to_vec()).await;
                        }

                        Some(Ok(Message::Binary(data))) => {
                            self.handler.on_message(&self, data.to_vec()).await;
                        }

                        Some(Ok(Message::Pong(data))) => {
                            self.handler.on_pong(&self, data.to_vec()).await;
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(session = %self.session, "WebSocket closed by remote");
                            break frame.map_or((CLOSE_NO_STATUS, Vec::new()), |f| {
                                (u16::from(f.code), f.reason.as_bytes().to_vec())
                            });
                        }

                        Some(Err(e)) => {
                            debug!(session = %self.session, error = %e, "WebSocket error");
                            break (CLOSE_ABNORMAL, Vec::new());
                        }

                        None => {
                            debug!(session = %self.session, "WebSocket stream ended");
                            break (CLOSE_ABNORMAL, Vec::new());
                        }

                        // Pings are answered by tungstenite
                        Some(Ok(_)) => {}
                    }
                }
            }
        };

        let closed_locally = *self.closed.borrow();
        if !closed_locally {
            self.handler.on_close(&self, code, reason).await;
        }
    }
}

// ============================================================================
// WebSocketBackend
// ============================================================================

/// Session backend over a [`WebSocket`].
pub struct WebSocketBackend {
    ws: Arc<WebSocket>,
}

impl WebSocketBackend {
    /// Wraps a connection.
    #[inline]
    #[must_use]
    pub fn new(ws: Arc<WebSocket>) -> Self {
        Self { ws }
    }
}

#[async_trait]
impl Backend for WebSocketBackend {
    async fn write(&self, data: &[u8]) -> Result<()> {
        self.ws.send_text(data).await
    }

    async fn close(&self) {
        self.ws.close(0, &[]).await;
    }
}
