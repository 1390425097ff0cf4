//! Listeners and admission control.
//!
//! # Modes
//!
//! | Mode | Loop | Admission refusal |
//! |------|------|-------------------|
//! | Raw TCP | [`tcp_accept_loop`] | Close the socket and stop accepting for good |
//! | WebSocket | [`ws_accept_loop`] | Reject the upgrade with `503`, keep accepting |
//!
//! The client cap is checked against the live count without holding the
//! registry lock, so a burst of WebSocket upgrades may briefly overshoot it.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::gate::core::{GateHandler, GateInner};

use super::tcp::TcpBackend;
use super::websocket::{WebSocket, WebSocketBackend, WebSocketHandler};

// ============================================================================
// Bind
// ============================================================================

/// Binds the gate's listening socket.
///
/// # Errors
///
/// Returns [`Error::Bind`] if the address cannot be bound.
pub(crate) async fn bind(address: &str) -> Result<TcpListener> {
    TcpListener::bind(address)
        .await
        .map_err(|e| Error::bind(address, e))
}

/// Waits for the next connection or a shutdown signal.
///
/// Returns `None` on shutdown. Accept errors are logged and skipped.
async fn next_connection(
    listener: &TcpListener,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<(TcpStream, SocketAddr)> {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return None,

            accepted = listener.accept() => match accepted {
                Ok(connection) => return Some(connection),
                Err(e) => warn!(error = %e, "Accept failed"),
            },
        }
    }
}

#[inline]
fn at_capacity(gate: &GateInner, max_clients: u32) -> bool {
    max_clients != 0 && gate.registry.live_clients() >= max_clients
}

// ============================================================================
// Raw TCP
// ============================================================================

/// Accepts raw TCP sessions until shutdown or the first admission refusal.
pub(crate) async fn tcp_accept_loop(
    gate: Arc<GateInner>,
    listener: TcpListener,
    max_clients: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("TCP accept loop started");

    while let Some((stream, addr)) = next_connection(&listener, &mut shutdown).await {
        if at_capacity(&gate, max_clients) {
            info!(?addr, max_clients, "Client limit reached, accept loop stopped");
            drop(stream);
            break;
        }

        gate.registry.admit();
        let session = gate.registry.next_session();
        let (backend, read_loop) = TcpBackend::new(session, stream, Arc::clone(&gate.pool));

        gate.registry.add_backend(session, backend);
        tokio::spawn(read_loop.run(Arc::clone(&gate)));

        debug!(session = %session, ?addr, "TCP session accepted");
    }

    debug!("TCP accept loop terminated");
}

// ============================================================================
// WebSocket
// ============================================================================

/// Accepts TCP connections and upgrades each one on its own task.
pub(crate) async fn ws_accept_loop(
    gate: Arc<GateInner>,
    listener: TcpListener,
    path: Arc<str>,
    max_clients: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(path = %path, "WebSocket accept loop started");

    while let Some((stream, addr)) = next_connection(&listener, &mut shutdown).await {
        tokio::spawn(upgrade(
            Arc::clone(&gate),
            stream,
            addr,
            Arc::clone(&path),
            max_clients,
        ));
    }

    debug!("WebSocket accept loop terminated");
}

/// Performs one upgrade and registers the resulting session.
async fn upgrade(
    gate: Arc<GateInner>,
    stream: TcpStream,
    addr: SocketAddr,
    path: Arc<str>,
    max_clients: u32,
) {
    let handler: Arc<dyn WebSocketHandler> = Arc::new(GateHandler::new(Arc::clone(&gate)));
    let mut allocated = None;

    let callback = |request: &Request, response: Response| {
        if request.uri().path() != &*path {
            return Err(reject(StatusCode::NOT_FOUND));
        }

        let origin = header(request, "origin");
        let host = header(request, "host").unwrap_or_default();
        if !handler.check_origin(origin, host) {
            debug!(?addr, ?origin, "Origin rejected");
            return Err(reject(StatusCode::FORBIDDEN));
        }

        if at_capacity(&gate, max_clients) {
            debug!(?addr, max_clients, "Client limit reached, upgrade refused");
            return Err(reject(StatusCode::SERVICE_UNAVAILABLE));
        }

        allocated = Some(gate.registry.next_session());
        Ok(response)
    };

    let result = tokio_tungstenite::accept_hdr_async(stream, callback).await;

    // An id allocated for a failed handshake is dropped here.
    let (ws_stream, session) = match (result, allocated) {
        (Ok(ws_stream), Some(session)) => (ws_stream, session),
        (Ok(_), None) => return,
        (Err(e), session) => {
            debug!(?addr, ?session, error = %e, "WebSocket upgrade failed");
            return;
        }
    };

    let ws = WebSocket::new(session, ws_stream, handler);
    gate.registry
        .add_backend(session, Arc::new(WebSocketBackend::new(Arc::clone(&ws))));
    gate.registry.admit();
    ws.start();

    debug!(session = %session, ?addr, "WebSocket session accepted");
}

fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers().get(name).and_then(|v| v.to_str().ok())
}

fn reject(status: StatusCode) -> ErrorResponse {
    let mut response = ErrorResponse::new(None);
    *response.status_mut() = status;
    response
}
