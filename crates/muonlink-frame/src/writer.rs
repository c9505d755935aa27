use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use muonlink_transport::LinkStream;
use tracing::trace;

use crate::codec::{encode_frame, Frame, FrameConfig, MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<usize> {
        self.send(frame.payload.as_ref())
    }

    /// Encode and send a payload. Returns the number of bytes put on the wire.
    ///
    /// An oversized payload fails before anything is written.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()?;
        trace!(size = payload.len(), wire = offset, "frame sent");
        Ok(offset)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<LinkStream> {
    /// Create a frame writer for `LinkStream` and apply write timeout from config.
    pub fn with_config_link(mut inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::accumulator::StreamAccumulator;
    use crate::codec::MAX_PAYLOAD;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let n = writer.send(b"AB").unwrap();
        assert_eq!(n, 6);
        assert_eq!(written(writer), vec![0xF9, 0x02, 0x41, 0x42, 0x83, 0xC4]);
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(b"one").unwrap();
        writer.send(b"two").unwrap();
        writer.send(b"three").unwrap();

        let mut acc = StreamAccumulator::new();
        acc.feed(&written(writer));
        let frames = acc.drain_frames();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload.as_ref(), b"one");
        assert_eq!(frames[1].payload.as_ref(), b"two");
        assert_eq!(frames[2].payload.as_ref(), b"three");
    }

    #[test]
    fn empty_payload_is_four_bytes() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(writer.send(b"").unwrap(), 4);
    }

    #[test]
    fn payload_too_large_rejected_without_output() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let err = writer.send(&[0u8; MAX_PAYLOAD + 1]).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn every_send_is_flushed() {
        let mut writer = FrameWriter::new(RecordingWriter::new(None));

        writer.send(b"x").unwrap();
        writer.send(b"y").unwrap();

        assert_eq!(writer.get_ref().flushes, 2);
    }

    #[test]
    fn write_frame_method() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let frame = Frame::new("abc");

        let wire = writer.write_frame(&frame).unwrap();
        assert_eq!(wire, frame.wire_size());

        let mut acc = StreamAccumulator::new();
        acc.feed(&written(writer));
        assert_eq!(acc.try_extract_one().unwrap(), frame);
    }

    #[test]
    fn short_writes_are_completed() {
        let mut writer = FrameWriter::new(OneByteWriter { data: Vec::new() });
        writer.send(b"chunked").unwrap();

        let mut acc = StreamAccumulator::new();
        acc.feed(&writer.into_inner().data);
        assert_eq!(acc.try_extract_one().unwrap().payload.as_ref(), b"chunked");
    }

    #[test]
    fn retries_interrupted_write_and_flush() {
        let mut writer = FrameWriter::new(RecordingWriter::new(Some(ErrorKind::Interrupted)));
        writer.send(b"retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), 9);
        assert_eq!(inner.flushes, 1);
    }

    #[test]
    fn retries_would_block_write_and_flush() {
        let mut writer = FrameWriter::new(RecordingWriter::new(Some(ErrorKind::WouldBlock)));
        writer.send(b"retry").unwrap();

        let mut acc = StreamAccumulator::new();
        acc.feed(&writer.into_inner().data);
        assert_eq!(acc.try_extract_one().unwrap().payload.as_ref(), b"retry");
    }

    #[test]
    fn broken_line_surfaces_as_io_error() {
        let mut writer = FrameWriter::new(RecordingWriter::new(Some(ErrorKind::BrokenPipe)));
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    #[cfg(unix)]
    fn link_writer_reaches_the_other_end() {
        let (left, right) = LinkStream::pair().unwrap();
        let cfg = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(100)),
            ..FrameConfig::default()
        };

        let mut writer = FrameWriter::with_config_link(left, cfg).unwrap();
        writer.send(b"test").unwrap();

        let mut reader = crate::reader::FrameReader::new(right);
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"test");
    }

    /// Fails the first write and the first flush with `hiccup`, then records.
    struct RecordingWriter {
        hiccup: Option<ErrorKind>,
        write_failed: bool,
        flush_failed: bool,
        flushes: usize,
        data: Vec<u8>,
    }

    impl RecordingWriter {
        fn new(hiccup: Option<ErrorKind>) -> Self {
            Self {
                hiccup,
                write_failed: false,
                flush_failed: false,
                flushes: 0,
                data: Vec::new(),
            }
        }
    }

    impl Write for RecordingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.hiccup {
                if !self.write_failed {
                    self.write_failed = true;
                    return Err(std::io::Error::from(kind));
                }
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if let Some(kind) = self.hiccup {
                if !self.flush_failed {
                    self.flush_failed = true;
                    return Err(std::io::Error::from(kind));
                }
            }
            self.flushes += 1;
            Ok(())
        }
    }

    struct OneByteWriter {
        data: Vec<u8>,
    }

    impl Write for OneByteWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match buf.first() {
                Some(byte) => {
                    self.data.push(*byte);
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
