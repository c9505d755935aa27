use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::accumulator::{enforce_ceiling, extract_from, Extract, LinkStats};
use crate::codec::{encode_frame, Frame, DEFAULT_MAX_BUFFERED, MAX_FRAME_SIZE};
use crate::error::FrameError;

/// `tokio_util` codec for link frames.
///
/// Applies the same rules as [`StreamAccumulator`](crate::StreamAccumulator)
/// to the buffer owned by `FramedRead`: corrupted candidates are skipped and
/// the buffer is capped.
#[derive(Debug, Clone)]
pub struct LinkCodec {
    max_buffered: usize,
    stats: LinkStats,
}

impl Default for LinkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkCodec {
    pub fn new() -> Self {
        Self::with_max_buffered(DEFAULT_MAX_BUFFERED)
    }

    pub fn with_max_buffered(max_buffered: usize) -> Self {
        Self {
            max_buffered: max_buffered.max(MAX_FRAME_SIZE),
            stats: LinkStats::default(),
        }
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }
}

impl Decoder for LinkCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match extract_from(src, &mut self.stats) {
                Extract::Frame(frame) => return Ok(Some(frame)),
                Extract::Rejected(_) => continue,
                Extract::Pending => {
                    enforce_ceiling(src, self.max_buffered, &mut self.stats);
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if !buf.is_empty() {
            debug!(remaining = buf.len(), "dropping partial frame at end of stream");
            self.stats.bytes_discarded += buf.len() as u64;
            buf.clear();
        }
        Ok(None)
    }
}

impl Encoder<&[u8]> for LinkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item, dst)
    }
}

impl Encoder<Bytes> for LinkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst)
    }
}

impl Encoder<Frame> for LinkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item.payload, dst)
    }
}
