//! Reusable read/write buffers for connection streams.
//!
//! Every TCP session needs a read buffer and a write buffer. The pool keeps
//! released buffers around so connection turnover does not allocate.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              BufferPool                 │
//! │  readers: [buf, buf, ...]  (idle)       │
//! │  writers: [buf, buf, ...]  (idle)       │
//! └─────────────────────────────────────────┘
//!        │ acquire(stream)      ▲ release → stream
//!        ▼                      │
//!   BufferedReader<R> / BufferedWriter<W>
//! ```
//!
//! Releasing always detaches the buffer from its stream and clears its
//! cursor, so a reused buffer never exposes bytes from a previous connection.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, ErrorKind};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::frame::HEADER_LEN;

// ============================================================================
// Constants
// ============================================================================

/// Default buffer size per direction.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

// ============================================================================
// Helpers
// ============================================================================

/// Returns `true` for errors that should be retried rather than treated as a
/// dead connection.
#[inline]
#[must_use]
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

// ============================================================================
// BufferPool
// ============================================================================

/// Unbounded pools of read-side and write-side buffers.
#[derive(Debug)]
pub struct BufferPool {
    /// Size of every buffer handed out.
    buffer_size: usize,
    /// Idle read buffers.
    readers: Mutex<Vec<Vec<u8>>>,
    /// Idle write buffers.
    writers: Mutex<Vec<Vec<u8>>>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    /// Creates an empty pool with [`DEFAULT_BUFFER_SIZE`] buffers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Creates an empty pool with a custom buffer size.
    ///
    /// Sizes smaller than a frame header are rounded up.
    #[must_use]
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(HEADER_LEN),
            readers: Mutex::new(Vec::new()),
            writers: Mutex::new(Vec::new()),
        }
    }

    /// Returns the size of the buffers handed out by this pool.
    #[inline]
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Binds a read buffer to `inner`, reusing an idle one if available.
    pub fn acquire_reader<R>(&self, inner: R) -> BufferedReader<R> {
        let buf = self
            .readers
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0; self.buffer_size]);

        BufferedReader {
            inner,
            buf,
            pos: 0,
            filled: 0,
        }
    }

    /// Detaches a reader from its stream and returns the buffer to the pool.
    ///
    /// Unread buffered bytes are discarded. The stream is handed back to the
    /// caller.
    pub fn release_reader<R>(&self, reader: BufferedReader<R>) -> R {
        let BufferedReader { inner, buf, .. } = reader;
        self.readers.lock().push(buf);
        inner
    }

    /// Binds a write buffer to `inner`, reusing an idle one if available.
    pub fn acquire_writer<W>(&self, inner: W) -> BufferedWriter<W> {
        let buf = self
            .writers
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.buffer_size));

        BufferedWriter {
            inner,
            buf,
            capacity: self.buffer_size,
        }
    }

    /// Detaches a writer from its stream and returns the buffer to the pool.
    ///
    /// Unflushed bytes are discarded.
    pub fn release_writer<W>(&self, writer: BufferedWriter<W>) -> W {
        let BufferedWriter { inner, mut buf, .. } = writer;
        buf.clear();
        self.writers.lock().push(buf);
        inner
    }

    /// Number of idle read buffers.
    #[inline]
    #[must_use]
    pub fn idle_readers(&self) -> usize {
        self.readers.lock().len()
    }

    /// Number of idle write buffers.
    #[inline]
    #[must_use]
    pub fn idle_writers(&self) -> usize {
        self.writers.lock().len()
    }
}

// ============================================================================
// BufferedReader
// ============================================================================

/// Pooled read buffer bound to a stream.
#[derive(Debug)]
pub struct BufferedReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
}

impl<R: AsyncRead + Unpin> BufferedReader<R> {
    /// Fills `out` completely.
    ///
    /// Transient errors are retried. A clean end of stream before `out` is
    /// full is reported as [`ErrorKind::UnexpectedEof`].
    pub async fn read_exact(&mut self, out: &mut [u8]) -> io::Result<()> {
        let mut done = 0;

        while done < out.len() {
            if self.pos == self.filled {
                // Large reads go straight to the caller's slice.
                if out.len() - done >= self.buf.len() {
                    done += self.read_retrying(&mut out[done..]).await?;
                    continue;
                }
                self.fill().await?;
            }

            let n = (self.filled - self.pos).min(out.len() - done);
            out[done..done + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            done += n;
        }

        Ok(())
    }

    /// Number of bytes buffered but not yet consumed.
    #[inline]
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.filled - self.pos
    }

    async fn fill(&mut self) -> io::Result<()> {
        let mut buf = std::mem::take(&mut self.buf);
        let result = self.read_retrying(&mut buf).await;
        self.buf = buf;

        self.pos = 0;
        self.filled = result?;
        Ok(())
    }

    async fn read_retrying(&mut self, out: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(out).await {
                Ok(0) => return Err(io::Error::from(ErrorKind::UnexpectedEof)),
                Ok(n) => return Ok(n),
                Err(e) if is_transient(&e) => tokio::task::yield_now().await,
                Err(e) => return Err(e),
            }
        }
    }
}

// ============================================================================
// BufferedWriter
// ============================================================================

/// Pooled write buffer bound to a stream.
#[derive(Debug)]
pub struct BufferedWriter<W> {
    inner: W,
    buf: Vec<u8>,
    capacity: usize,
}

impl<W: AsyncWrite + Unpin> BufferedWriter<W> {
    /// Buffers `data`, spilling to the stream when the buffer would overflow.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.buf.len() + data.len() > self.capacity {
            self.flush_buf().await?;
        }

        if data.len() >= self.capacity {
            self.inner.write_all(data).await
        } else {
            self.buf.extend_from_slice(data);
            Ok(())
        }
    }

    /// Writes out buffered bytes and flushes the stream.
    pub async fn flush(&mut self) -> io::Result<()> {
        self.flush_buf().await?;
        self.inner.flush().await
    }

    /// Shuts down the write side of the stream.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }

    /// Number of bytes waiting for the next flush.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    async fn flush_buf(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let result = self.inner.write_all(&self.buf).await;
        self.buf.clear();
        result
    }
}

// ============================================================================
// Tests
// ============================================================================
