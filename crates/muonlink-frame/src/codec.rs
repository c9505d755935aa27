use std::ops::Range;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum::Checksum;
use crate::error::{FrameError, Result};

/// Frame start sentinel.
pub const HEADER_BYTE: u8 = 0xF9;

/// Header (1) + length (1) + checksum pair (2).
pub const FRAME_OVERHEAD: usize = 4;

/// The length field is a single byte.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Largest frame on the wire.
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD + FRAME_OVERHEAD;

/// Default receive buffer ceiling: room for a few back-to-back maximum frames.
pub const DEFAULT_MAX_BUFFERED: usize = 4 * MAX_FRAME_SIZE;

/// One message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The message payload, opaque to the codec.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (overhead + payload).
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Checksum the frame carries on the wire.
    pub fn checksum(&self) -> Checksum {
        Checksum::compute(&self.payload)
    }

    /// Encode into a fresh buffer.
    pub fn to_wire(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(&self.payload, &mut dst)?;
        Ok(dst.freeze())
    }
}

/// Encode a payload into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌────────┬────────┬──────────────────┬──────┬──────┐
/// │ Header │ Length │ Payload          │ ChkA │ ChkB │
/// │ 0xF9   │ (1B)   │ (Length bytes)   │ (1B) │ (1B) │
/// └────────┴────────┴──────────────────┴──────┴──────┘
/// ```
///
/// The checksum covers the payload only. An oversized payload leaves `dst` untouched.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u8::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: MAX_PAYLOAD,
    })?;
    let sum = Checksum::compute(payload);

    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_u8(HEADER_BYTE);
    dst.put_u8(len);
    dst.put_slice(payload);
    dst.put_slice(&sum.to_bytes());
    Ok(())
}

/// Where a candidate frame sits inside a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    /// Offset of the header byte.
    pub offset: usize,
    /// Value of the length byte.
    pub payload_len: usize,
}

impl FrameSpan {
    /// Payload bytes within the buffer.
    pub fn payload(&self) -> Range<usize> {
        let start = self.offset + 2;
        start..start + self.payload_len
    }

    /// Checksum pair bytes within the buffer.
    pub fn checksum(&self) -> Range<usize> {
        let start = self.offset + 2 + self.payload_len;
        start..start + 2
    }

    /// One past the last byte of the frame.
    pub fn end(&self) -> usize {
        self.offset + FRAME_OVERHEAD + self.payload_len
    }
}

/// A fully buffered candidate whose checksum did not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// Where the candidate sat; the buffer is trimmed through `span.end()`.
    pub span: FrameSpan,
    /// Checksum recomputed over the candidate payload.
    pub computed: Checksum,
    /// Checksum bytes found in the buffer.
    pub received: Checksum,
}

/// Result of one decode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Not enough bytes yet. Nothing may be discarded.
    Incomplete,
    /// A checksum-valid frame. Everything before `span.end()` is consumed.
    Decoded(FrameSpan),
    /// A complete candidate that failed its checksum.
    Rejected(Rejection),
}

/// Try to locate the next frame in `src` without modifying it.
///
/// Only the first header byte that has at least [`FRAME_OVERHEAD`] bytes
/// behind it (itself included) is considered. If the frame it announces is
/// not fully buffered yet the result is [`DecodeOutcome::Incomplete`]; later
/// header bytes are not tried, since the same header may complete on the next
/// read. A header value inside a payload that precedes the true frame start
/// can therefore produce a false boundary. The format has no escaping, so this
/// is accepted rather than worked around.
pub fn decode_frame(src: &[u8]) -> DecodeOutcome {
    if src.len() < FRAME_OVERHEAD {
        return DecodeOutcome::Incomplete;
    }

    let last_candidate = src.len() - FRAME_OVERHEAD;
    let Some(offset) = src[..=last_candidate]
        .iter()
        .position(|&b| b == HEADER_BYTE)
    else {
        return DecodeOutcome::Incomplete;
    };

    let span = FrameSpan {
        offset,
        payload_len: src[offset + 1] as usize,
    };
    if src.len() < span.end() {
        return DecodeOutcome::Incomplete;
    }

    let computed = Checksum::compute(&src[span.payload()]);
    let check = span.checksum();
    let received = Checksum {
        a: src[check.start],
        b: src[check.start + 1],
    };

    if computed == received {
        DecodeOutcome::Decoded(span)
    } else {
        DecodeOutcome::Rejected(Rejection {
            span,
            computed,
            received,
        })
    }
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Receive buffer ceiling in bytes; the oldest bytes are dropped beyond it.
    /// Values below [`MAX_FRAME_SIZE`] are raised to it.
    pub max_buffered: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_buffered: DEFAULT_MAX_BUFFERED,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
