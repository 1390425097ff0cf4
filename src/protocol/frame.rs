//! Length-prefixed TCP framing.
//!
//! # Format
//!
//! ```text
//! ┌──────────────┬──────────────────────────┐
//! │ len: u16 BE  │ payload: len bytes       │
//! └──────────────┴──────────────────────────┘
//! ```
//!
//! The same layout is used in both directions. There is no checksum,
//! compression or type tag; payloads are opaque.

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 2;

/// Largest payload representable by the prefix.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

// ============================================================================
// Header Codec
// ============================================================================

/// Encodes the length prefix for a payload of `len` bytes.
///
/// # Errors
///
/// Returns [`Error::FrameTooLarge`] if `len` exceeds [`MAX_PAYLOAD_LEN`].
#[inline]
pub fn encode_header(len: usize) -> Result<[u8; HEADER_LEN]> {
    u16::try_from(len)
        .map(u16::to_be_bytes)
        .map_err(|_| Error::frame_too_large(len))
}

/// Decodes a length prefix into a payload length.
#[inline]
#[must_use]
pub const fn decode_header(header: [u8; HEADER_LEN]) -> usize {
    u16::from_be_bytes(header) as usize
}

/// Checks that a payload fits in one frame.
///
/// # Errors
///
/// Returns [`Error::FrameTooLarge`] if it does not.
#[inline]
pub fn check_payload(payload: &[u8]) -> Result<()> {
    encode_header(payload.len()).map(|_| ())
}

/// Encodes a complete frame into a new buffer.
///
/// # Errors
///
/// Returns [`Error::FrameTooLarge`] if the payload is too long.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    let header = encode_header(payload.len())?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Splits one complete frame off the front of `bytes`.
///
/// Returns the payload and the remaining bytes, or `None` if `bytes` does not
/// yet hold a whole frame.
#[must_use]
pub fn split_frame(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let header: [u8; HEADER_LEN] = bytes.get(..HEADER_LEN)?.try_into().ok()?;
    let rest = &bytes[HEADER_LEN..];
    let len = decode_header(header);
    (rest.len() >= len).then(|| rest.split_at(len))
}

// ============================================================================
// Tests
// ============================================================================
