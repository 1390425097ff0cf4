//! Raw TCP session backend.
//!
//! Each accepted socket is split in two:
//!
//! - The read half is owned by a [`TcpReadLoop`] task that decodes
//!   length-prefixed frames and notifies the gate.
//! - The write half lives in the [`TcpBackend`] behind an async mutex, so
//!   concurrent writes are serialized frame by frame.
//!
//! Closing never waits for a write to drain. A write stuck on a client that
//! stopped reading is abandoned with [`Error::ConnectionClosed`], which frees
//! the mutex so the socket can be shut down.
//!
//! Both halves use buffers from the gate's [`BufferPool`].

// ============================================================================
// Imports
// ============================================================================

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, Notify, watch};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::gate::core::GateInner;
use crate::identifiers::SessionId;
use crate::protocol::GateEvent;
use crate::protocol::frame::{self, HEADER_LEN};

use super::backend::{Backend, until_closed};
use super::pool::{BufferPool, BufferedReader, BufferedWriter};

// ============================================================================
// TcpBackend
// ============================================================================

/// Write side of one TCP session.
pub struct TcpBackend {
    /// Owning session.
    session: SessionId,
    /// Remote address, for logging.
    peer: Option<SocketAddr>,
    /// Pool the write buffer is returned to.
    pool: Arc<BufferPool>,
    /// Buffered write half. `None` once closed.
    writer: Mutex<Option<BufferedWriter<OwnedWriteHalf>>>,
    /// Wakes the read loop when the session is closed locally.
    stop: Arc<Notify>,
    /// Flips to `true` on close; aborts in-flight writes.
    closed: watch::Sender<bool>,
}

impl TcpBackend {
    /// Splits `stream` into a backend and its (not yet running) read loop.
    ///
    /// The caller registers the backend first and then spawns
    /// [`TcpReadLoop::run`], so no frame is delivered for an unknown session.
    pub(crate) fn new(
        session: SessionId,
        stream: TcpStream,
        pool: Arc<BufferPool>,
    ) -> (Arc<Self>, TcpReadLoop) {
        let peer = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        let stop = Arc::new(Notify::new());

        let reader = TcpReadLoop {
            session,
            reader: pool.acquire_reader(read_half),
            pool: Arc::clone(&pool),
            stop: Arc::clone(&stop),
        };

        let backend = Arc::new(Self {
            session,
            peer,
            writer: Mutex::new(Some(pool.acquire_writer(write_half))),
            pool,
            stop,
            closed: watch::Sender::new(false),
        });

        (backend, reader)
    }

    /// Writes one frame under the writer lock.
    async fn write_frame(&self, header: &[u8], data: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        writer.write(header).await?;
        writer.write(data).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for TcpBackend {
    async fn write(&self, data: &[u8]) -> Result<()> {
        let header = frame::encode_header(data.len())?;

        let mut closed = self.closed.subscribe();
        tokio::select! {
            biased;

            () = until_closed(&mut closed) => {
                trace!(session = %self.session, "Write abandoned, session closed");
                Err(Error::ConnectionClosed)
            }

            result = self.write_frame(&header, data) => {
                result?;
                trace!(session = %self.session, len = data.len(), "Frame sent");
                Ok(())
            }
        }
    }

    async fn close(&self) {
        self.stop.notify_one();
        self.closed.send_replace(true);

        // Pending writers drop the lock as soon as they see the close flag
        let writer = self.writer.lock().await.take();
        if let Some(writer) = writer {
            let mut write_half = self.pool.release_writer(writer);
            if let Err(e) = write_half.shutdown().await {
                trace!(session = %self.session, error = %e, "Socket shutdown failed");
            }
        }

        debug!(session = %self.session, peer = ?self.peer, "TCP session closed");
    }
}

// ============================================================================
// TcpReadLoop
// ============================================================================

/// Read side of one TCP session.
pub(crate) struct TcpReadLoop {
    session: SessionId,
    reader: BufferedReader<OwnedReadHalf>,
    pool: Arc<BufferPool>,
    stop: Arc<Notify>,
}

impl TcpReadLoop {
    /// Decodes frames until the connection fails or the session is closed.
    ///
    /// A read failure kicks the session. A local close just releases the
    /// read buffer.
    pub(crate) async fn run(self, gate: Arc<GateInner>) {
        let Self {
            session,
            mut reader,
            pool,
            stop,
        } = self;

        let failure = tokio::select! {
            err = read_frames(session, &mut reader, &gate) => Some(err),
            () = stop.notified() => None,
        };

        drop(pool.release_reader(reader));

        if let Some(err) = failure {
            debug!(session = %session, error = %err, "TCP read loop ended");
            gate.kick(session).await;
        }
    }
}

/// Reads `[len][payload]` frames forever, returning the first fatal error.
async fn read_frames(
    session: SessionId,
    reader: &mut BufferedReader<OwnedReadHalf>,
    gate: &GateInner,
) -> io::Error {
    let mut header = [0u8; HEADER_LEN];

    loop {
        if let Err(e) = reader.read_exact(&mut header).await {
            return e;
        }

        let mut payload = vec![0u8; frame::decode_header(header)];
        if let Err(e) = reader.read_exact(&mut payload).await {
            return e;
        }

        trace!(session = %session, len = payload.len(), "Frame received");
        gate.notify(GateEvent::OnMessage { session, payload });
    }
}
