//! Actor-facing control surface of the gate.
//!
//! The gate runs as its own task and is addressed through a [`GateHandle`]:
//!
//! ```text
//! ┌──────────────┐  OPEN / KICK / SHUTDOWN  ┌──────────────┐
//! │    Actor     │ ───────────────────────► │  GateService │
//! │              │  WRITE(session, bytes)   │    (task)    │
//! │              │ ───────────────────────► │              │
//! │   Mailbox    │ ◄─────────────────────── │     Gate     │
//! └──────────────┘   ON_OPEN / ON_MESSAGE   └──────────────┘
//!                    ON_CLOSE / ON_PONG
//! ```
//!
//! Requests are served one at a time in arrival order, so two writes to the
//! same session are delivered in the order they were issued. A write to a
//! stalled client holds up the requests queued behind it.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::ControlCommand;

use super::config::GateConfig;
use super::core::Gate;

// ============================================================================
// GateRequest
// ============================================================================

/// Internal requests for the service task.
enum GateRequest {
    /// A control command.
    Control {
        command: ControlCommand,
        reply: oneshot::Sender<Result<()>>,
    },
    /// A response payload for one session.
    Write {
        session: SessionId,
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
}

// ============================================================================
// GateHandle
// ============================================================================

/// Address of a running gate service.
///
/// Cloning the handle is cheap. Once every handle is dropped the service
/// shuts the gate down: the listener stops and every live session is kicked.
#[derive(Clone, Debug)]
pub struct GateHandle {
    /// Request channel into the service task.
    tx: mpsc::UnboundedSender<GateRequest>,
    /// The gate served by the task.
    gate: Gate,
}

impl GateHandle {
    /// Spawns a service task for `gate`.
    #[must_use]
    pub fn spawn(gate: Gate) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_service(gate.clone(), rx));
        Self { tx, gate }
    }

    /// Returns the gate served by this handle.
    #[inline]
    #[must_use]
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// `OPEN`: binds the listener and enables writes.
    ///
    /// # Errors
    ///
    /// See [`Gate::open`].
    pub async fn open(&self, config: GateConfig) -> Result<()> {
        self.control(ControlCommand::Open(config)).await
    }

    /// `KICK`: tears down a session. Never fails for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GateStopped`] if the service is gone.
    pub async fn kick(&self, session: SessionId) -> Result<()> {
        self.control(ControlCommand::Kick(session)).await
    }

    /// Stops the listener and kicks every session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GateStopped`] if the service is gone.
    pub async fn shutdown(&self) -> Result<()> {
        self.control(ControlCommand::Shutdown).await
    }

    /// Sends a control command and waits for it to complete.
    ///
    /// # Errors
    ///
    /// - [`Error::GateStopped`] if the service is gone
    /// - the command's own error
    pub async fn control(&self, command: ControlCommand) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(GateRequest::Control { command, reply })
            .map_err(|_| Error::GateStopped)?;
        rx.await?
    }

    /// `WRITE`: delivers a payload to a session.
    ///
    /// # Errors
    ///
    /// - [`Error::GateStopped`] if the service is gone
    /// - see [`Gate::write`]
    pub async fn write(&self, session: SessionId, payload: impl Into<Vec<u8>>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(GateRequest::Write {
                session,
                payload: payload.into(),
                reply,
            })
            .map_err(|_| Error::GateStopped)?;
        rx.await?
    }
}

// ============================================================================
// Service Loop
// ============================================================================

/// Serves requests until every handle is dropped.
async fn run_service(gate: Gate, mut rx: mpsc::UnboundedReceiver<GateRequest>) {
    debug!("Gate service started");

    while let Some(request) = rx.recv().await {
        match request {
            GateRequest::Control { command, reply } => {
                let name = command.name();
                let result = handle_control(&gate, command).await;
                if let Err(e) = &result {
                    warn!(command = name, error = %e, "Gate command failed");
                }
                let _ = reply.send(result);
            }

            GateRequest::Write {
                session,
                payload,
                reply,
            } => {
                let result = gate.write(session, &payload).await;
                match &result {
                    Err(e) if e.is_connection_error() => {
                        debug!(session = %session, error = %e, "Write to broken connection");
                    }
                    Err(e) => trace!(session = %session, error = %e, "Write rejected"),
                    Ok(()) => {}
                }
                let _ = reply.send(result);
            }
        }
    }

    if gate.is_open() {
        gate.shutdown().await;
    }
    debug!("Gate service terminated");
}

async fn handle_control(gate: &Gate, command: ControlCommand) -> Result<()> {
    match command {
        ControlCommand::Open(config) => gate.open(config).await.map(|_| ()),
        ControlCommand::Kick(session) => {
            gate.kick(session).await;
            Ok(())
        }
        ControlCommand::Shutdown => {
            gate.shutdown().await;
            Ok(())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
