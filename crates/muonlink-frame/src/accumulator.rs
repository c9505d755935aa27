use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use crate::codec::{
    decode_frame, DecodeOutcome, Frame, Rejection, DEFAULT_MAX_BUFFERED, MAX_FRAME_SIZE,
};

/// Counters kept by a [`StreamAccumulator`] over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Checksum-valid frames handed out.
    pub frames_decoded: u64,
    /// Complete candidates that failed their checksum.
    pub frames_rejected: u64,
    /// Bytes dropped without being part of a decoded frame: garbage before a
    /// frame, rejected spans, and overflow.
    pub bytes_discarded: u64,
}

/// Result of one extraction step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extract {
    /// A frame was decoded and removed from the buffer.
    Frame(Frame),
    /// A candidate failed its checksum; its span was removed from the buffer.
    Rejected(Rejection),
    /// Waiting for more bytes; the buffer is unchanged.
    Pending,
}

/// Receive-side state of one link direction.
///
/// Bytes from the transport are appended with [`feed`](Self::feed) and frames
/// are taken out one at a time with [`try_extract_one`](Self::try_extract_one).
/// One transport read may carry zero, one or several frames, so callers keep
/// extracting until nothing comes out.
#[derive(Debug)]
pub struct StreamAccumulator {
    buf: BytesMut,
    max_buffered: usize,
    stats: LinkStats,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::with_max_buffered(DEFAULT_MAX_BUFFERED)
    }

    /// Create an accumulator holding at most `max_buffered` bytes.
    ///
    /// The ceiling is never lower than one maximum frame, otherwise a
    /// legitimate frame could be cut before it completes.
    pub fn with_max_buffered(max_buffered: usize) -> Self {
        let max_buffered = max_buffered.max(MAX_FRAME_SIZE);
        Self {
            buf: BytesMut::with_capacity(max_buffered),
            max_buffered,
            stats: LinkStats::default(),
        }
    }

    /// Append received bytes. No parsing happens here.
    ///
    /// The ceiling is not applied here: one read may carry more complete
    /// frames than the ceiling holds, and those are extracted first. See
    /// [`extract`](Self::extract).
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Run one decode attempt and return the payload of a valid frame.
    ///
    /// `None` means either that more bytes are needed or that a corrupted
    /// candidate was just discarded; calling again is always safe.
    pub fn try_extract_one(&mut self) -> Option<Frame> {
        match self.extract() {
            Extract::Frame(frame) => Some(frame),
            Extract::Rejected(_) | Extract::Pending => None,
        }
    }

    /// Run one decode attempt and report what happened.
    ///
    /// On a checksum mismatch the buffer is trimmed through the end the
    /// rejected candidate announced (`offset + 4 + length`), not cleared. A
    /// header that follows inside that span is skipped with it; one that
    /// follows after it gets a fresh attempt on the next call.
    ///
    /// Once nothing more can be extracted, a buffer above its ceiling drops
    /// its oldest bytes. A stream that never carries a header byte would
    /// otherwise grow without bound.
    pub fn extract(&mut self) -> Extract {
        let outcome = extract_from(&mut self.buf, &mut self.stats);
        if matches!(outcome, Extract::Pending) {
            enforce_ceiling(&mut self.buf, self.max_buffered, &mut self.stats);
        }
        outcome
    }

    /// Drain every frame currently decodable, skipping rejected candidates.
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        loop {
            match self.extract() {
                Extract::Frame(frame) => frames.push(frame),
                Extract::Rejected(_) => continue,
                Extract::Pending => return frames,
            }
        }
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop everything buffered, e.g. after the link was reopened.
    pub fn clear(&mut self) {
        let len = self.buf.len();
        self.discard(len);
    }

    pub fn max_buffered(&self) -> usize {
        self.max_buffered
    }

    /// Change the ceiling for subsequent feeds.
    pub fn set_max_buffered(&mut self, max_buffered: usize) {
        self.max_buffered = max_buffered.max(MAX_FRAME_SIZE);
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    fn discard(&mut self, count: usize) {
        discard(&mut self.buf, count, &mut self.stats);
    }
}

/// One decode attempt over `buf`, removing whatever the outcome consumes.
pub(crate) fn extract_from(buf: &mut BytesMut, stats: &mut LinkStats) -> Extract {
    match decode_frame(&buf[..]) {
        DecodeOutcome::Incomplete => Extract::Pending,
        DecodeOutcome::Decoded(span) => {
            if span.offset > 0 {
                debug!(skipped = span.offset, "skipped bytes before frame header");
                discard(buf, span.offset, stats);
            }
            buf.advance(2);
            let payload = buf.split_to(span.payload_len).freeze();
            buf.advance(2);
            stats.frames_decoded += 1;
            Extract::Frame(Frame { payload })
        }
        DecodeOutcome::Rejected(rejection) => {
            warn!(
                offset = rejection.span.offset,
                len = rejection.span.payload_len,
                computed = %rejection.computed,
                received = %rejection.received,
                "checksum mismatch, discarding frame"
            );
            discard(buf, rejection.span.end(), stats);
            stats.frames_rejected += 1;
            Extract::Rejected(rejection)
        }
    }
}

/// Drop the oldest bytes so that `buf` holds at most `max_buffered`.
pub(crate) fn enforce_ceiling(buf: &mut BytesMut, max_buffered: usize, stats: &mut LinkStats) {
    let excess = buf.len().saturating_sub(max_buffered);
    if excess > 0 {
        warn!(
            dropped = excess,
            max_buffered, "receive buffer overflow, dropping oldest bytes"
        );
        discard(buf, excess, stats);
    }
}

fn discard(buf: &mut BytesMut, count: usize, stats: &mut LinkStats) {
    buf.advance(count);
    stats.bytes_discarded += count as u64;
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, HEADER_BYTE, MAX_PAYLOAD};

    fn encoded(payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(payload, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn split_delivery_yields_frame_once() {
        let mut acc = StreamAccumulator::new();
        acc.feed(&[0xF9, 0x02, 0x41]);
        assert!(acc.try_extract_one().is_none());
        acc.feed(&[0x42, 0x83, 0xC4]);

        let frame = acc.try_extract_one().unwrap();
        assert_eq!(frame.payload.as_ref(), b"AB");
        assert!(acc.try_extract_one().is_none());
        assert!(acc.is_empty());
        assert_eq!(acc.stats().frames_decoded, 1);
    }

    #[test]
    fn byte_at_a_time_delivery() {
        let wire = encoded(b"byte by byte");
        let mut acc = StreamAccumulator::new();

        for (i, byte) in wire.iter().enumerate() {
            acc.feed(&[*byte]);
            let extracted = acc.extract();
            if i + 1 < wire.len() {
                assert_eq!(extracted, Extract::Pending, "after {} bytes", i + 1);
                assert_eq!(acc.len(), i + 1);
            } else {
                match extracted {
                    Extract::Frame(frame) => {
                        assert_eq!(frame.payload.as_ref(), b"byte by byte")
                    }
                    other => panic!("expected frame, got {other:?}"),
                }
            }
        }
        assert!(acc.is_empty());
        assert_eq!(acc.extract(), Extract::Pending);
    }

    #[test]
    fn several_frames_in_one_feed() {
        let mut wire = encoded(b"one");
        wire.extend(encoded(b""));
        wire.extend(encoded(b"three"));

        let mut acc = StreamAccumulator::new();
        acc.feed(&wire);

        let payloads: Vec<_> = acc.drain_frames().into_iter().map(|f| f.payload).collect();
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[0].as_ref(), b"one");
        assert!(payloads[1].is_empty());
        assert_eq!(payloads[2].as_ref(), b"three");
        assert!(acc.is_empty());
    }

    #[test]
    fn trailing_partial_frame_is_retained() {
        let mut wire = encoded(b"first");
        let second = encoded(b"second");
        wire.extend_from_slice(&second[..3]);

        let mut acc = StreamAccumulator::new();
        acc.feed(&wire);
        assert_eq!(acc.try_extract_one().unwrap().payload.as_ref(), b"first");
        assert!(acc.try_extract_one().is_none());
        assert_eq!(acc.buffered(), &second[..3]);

        acc.feed(&second[3..]);
        assert_eq!(acc.try_extract_one().unwrap().payload.as_ref(), b"second");
    }

    #[test]
    fn rejection_trims_through_announced_end_only() {
        let mut bad = encoded(b"bad");
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let good = encoded(b"good");

        let mut acc = StreamAccumulator::new();
        acc.feed(&bad);
        acc.feed(&good);

        assert!(acc.try_extract_one().is_none());
        assert_eq!(acc.buffered(), good.as_slice());
        assert_eq!(acc.try_extract_one().unwrap().payload.as_ref(), b"good");

        let stats = acc.stats();
        assert_eq!(stats.frames_rejected, 1);
        assert_eq!(stats.frames_decoded, 1);
        assert_eq!(stats.bytes_discarded, bad.len() as u64);
    }

    #[test]
    fn corrupted_length_swallows_following_frame() {
        // length byte 0x02 corrupted to 0x09: the candidate now spans the next frame
        let mut bad = encoded(b"AB");
        bad[1] = 0x09;
        let good = encoded(b"ok");
        let mut wire = bad.clone();
        wire.extend(&good);
        wire.extend([0x00, 0x00]);
        assert_eq!(wire.len(), 2 + 9 + 2 + 1);

        let mut acc = StreamAccumulator::new();
        acc.feed(&wire);
        match acc.extract() {
            Extract::Rejected(rejection) => assert_eq!(rejection.span.end(), 13),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(acc.buffered(), &[0x00]);
        assert_eq!(acc.extract(), Extract::Pending);
    }

    #[test]
    fn payload_with_header_values_survives() {
        let payload = [HEADER_BYTE, 0x01, HEADER_BYTE, HEADER_BYTE];
        let mut acc = StreamAccumulator::new();
        acc.feed(&encoded(&payload));
        assert_eq!(acc.try_extract_one().unwrap().payload.as_ref(), &payload);
        assert!(acc.is_empty());
    }

    #[test]
    fn garbage_before_frame_is_counted() {
        let mut wire = vec![0x01, 0x02, 0x03];
        wire.extend(encoded(b"x"));

        let mut acc = StreamAccumulator::new();
        acc.feed(&wire);
        assert_eq!(acc.try_extract_one().unwrap().payload.as_ref(), b"x");
        assert_eq!(acc.stats().bytes_discarded, 3);
    }

    #[test]
    fn overflow_drops_oldest_bytes() {
        let mut acc = StreamAccumulator::with_max_buffered(MAX_FRAME_SIZE);
        acc.feed(&vec![0x00; 2 * MAX_FRAME_SIZE]);
        assert_eq!(acc.len(), 2 * MAX_FRAME_SIZE);

        assert!(acc.try_extract_one().is_none());
        assert_eq!(acc.len(), MAX_FRAME_SIZE);
        assert_eq!(acc.stats().bytes_discarded, MAX_FRAME_SIZE as u64);

        acc.feed(&encoded(b"late"));
        assert_eq!(acc.try_extract_one().unwrap().payload.as_ref(), b"late");
        assert!(acc.is_empty());
        assert_eq!(acc.stats().bytes_discarded, 2 * MAX_FRAME_SIZE as u64);
    }

    #[test]
    fn read_larger_than_ceiling_keeps_every_valid_frame() {
        let mut acc = StreamAccumulator::new();
        let mut wire = Vec::new();
        for i in 0..5u8 {
            wire.extend_from_slice(&encoded(&[i; MAX_PAYLOAD]));
        }
        assert!(wire.len() > acc.max_buffered());

        acc.feed(&wire);
        let frames = acc.drain_frames();

        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.payload[0], i as u8);
        }
        assert!(acc.is_empty());
        assert_eq!(acc.stats().bytes_discarded, 0);
    }

    #[test]
    fn oversized_tail_is_capped_after_frames_are_taken() {
        let mut acc = StreamAccumulator::with_max_buffered(MAX_FRAME_SIZE);
        let mut wire = encoded(b"first");
        wire.extend_from_slice(&vec![0x00; 3 * MAX_FRAME_SIZE]);
        wire.extend_from_slice(&[HEADER_BYTE, 0x05, 0x41]);

        acc.feed(&wire);
        assert_eq!(acc.try_extract_one().unwrap().payload.as_ref(), b"first");
        assert!(acc.try_extract_one().is_none());

        assert_eq!(acc.len(), MAX_FRAME_SIZE);
        assert!(acc.buffered().ends_with(&[HEADER_BYTE, 0x05, 0x41]));
    }

    #[test]
    fn ceiling_never_below_max_frame() {
        let mut acc = StreamAccumulator::with_max_buffered(8);
        assert_eq!(acc.max_buffered(), MAX_FRAME_SIZE);

        let payload = vec![0x5A; 255];
        acc.feed(&encoded(&payload));
        assert_eq!(acc.try_extract_one().unwrap().payload.as_ref(), payload.as_slice());

        acc.set_max_buffered(0);
        assert_eq!(acc.max_buffered(), MAX_FRAME_SIZE);
    }

    #[test]
    fn clear_counts_discarded_bytes() {
        let mut acc = StreamAccumulator::new();
        acc.feed(&[1, 2, 3, 4, 5]);
        acc.clear();
        assert!(acc.is_empty());
        assert_eq!(acc.stats().bytes_discarded, 5);
    }
}
