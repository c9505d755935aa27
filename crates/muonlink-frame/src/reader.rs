use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use muonlink_transport::LinkStream;

use crate::accumulator::{Extract, LinkStats, StreamAccumulator};
use crate::codec::{Frame, FrameConfig, MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = MAX_FRAME_SIZE;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads, leading garbage and corrupted frames internally;
/// callers only ever see checksum-valid payloads.
pub struct FrameReader<T> {
    inner: T,
    acc: StreamAccumulator,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            acc: StreamAccumulator::with_max_buffered(config.max_buffered),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. Read
    /// timeouts surface as `FrameError::Io`; use [`poll_frame`](Self::poll_frame)
    /// on links where a quiet read is normal.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.next_buffered() {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.acc.feed(&chunk[..read]);
        }
    }

    /// Perform at most one read and return a frame if one is available.
    ///
    /// A read that yields nothing, times out or would block means "no new data
    /// this cycle" and returns `Ok(None)`. Other I/O errors propagate.
    pub fn poll_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.next_buffered() {
            return Ok(Some(frame));
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_quiet(err.kind()) => return Ok(None),
                Err(err) => return Err(FrameError::Io(err)),
            }
        };

        if read == 0 {
            return Ok(None);
        }

        self.acc.feed(&chunk[..read]);
        Ok(self.next_buffered())
    }

    /// Poll until a frame arrives or `timeout` elapses.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.poll_frame()? {
                return Ok(Some(frame));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    /// Take the next valid frame out of already buffered bytes, skipping rejects.
    fn next_buffered(&mut self) -> Option<Frame> {
        loop {
            match self.acc.extract() {
                Extract::Frame(frame) => return Some(frame),
                Extract::Rejected(_) => continue,
                Extract::Pending => return None,
            }
        }
    }

    /// Counters of the underlying accumulator.
    pub fn stats(&self) -> LinkStats {
        self.acc.stats()
    }

    /// Bytes received but not yet part of a frame.
    pub fn buffered_len(&self) -> usize {
        self.acc.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    ///
    /// Bytes still sitting in the receive buffer are lost.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update the receive buffer ceiling.
    pub fn set_max_buffered(&mut self, max_buffered: usize) {
        self.acc.set_max_buffered(max_buffered);
        self.config.max_buffered = self.acc.max_buffered();
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<LinkStream> {
    /// Create a frame reader for `LinkStream` and apply read timeout from config.
    pub fn with_config_link(mut inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn is_quiet(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

pub(crate) fn transport_to_frame_error(err: muonlink_transport::TransportError) -> FrameError {
    match err {
        muonlink_transport::TransportError::Io(io) => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
