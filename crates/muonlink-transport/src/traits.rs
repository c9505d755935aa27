use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::error::{Result, TransportError};

/// A connected link stream. Implements Read + Write.
///
/// This is the byte pipe the framing layer sits on. It carries no framing
/// knowledge of its own. On a board link it wraps an OS serial device; on
/// Unix it can also wrap one end of a connected socket pair, which is how
/// loopback tests and local simulations stand in for the hardware.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    Serial(Box<dyn SerialPort>),
    #[cfg(unix)]
    Socket(std::os::unix::net::UnixStream),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port.read(buf),
            #[cfg(unix)]
            LinkStreamInner::Socket(stream) => stream.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port.write(buf),
            #[cfg(unix)]
            LinkStreamInner::Socket(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port.flush(),
            #[cfg(unix)]
            LinkStreamInner::Socket(stream) => stream.flush(),
        }
    }
}

impl LinkStream {
    /// Wrap an already opened serial port.
    pub fn from_serial(port: Box<dyn SerialPort>) -> Self {
        Self {
            inner: LinkStreamInner::Serial(port),
        }
    }

    /// Create two connected in-process streams.
    ///
    /// Bytes written to one end are read from the other, like a null-modem cable.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((
            Self {
                inner: LinkStreamInner::Socket(left),
            },
            Self {
                inner: LinkStreamInner::Socket(right),
            },
        ))
    }

    /// Set read timeout on the underlying stream.
    ///
    /// Serial ports have a single timeout shared by reads and writes, and
    /// always have one: `None` leaves the currently configured value in place.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => match timeout {
                Some(timeout) => port.set_timeout(timeout).map_err(Into::into),
                None => Ok(()),
            },
            #[cfg(unix)]
            LinkStreamInner::Socket(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    ///
    /// See [`LinkStream::set_read_timeout`] for serial port semantics.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => match timeout {
                Some(timeout) => port.set_timeout(timeout).map_err(Into::into),
                None => Ok(()),
            },
            #[cfg(unix)]
            LinkStreamInner::Socket(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (creates a new handle to the same device).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            LinkStreamInner::Serial(port) => Ok(Self::from_serial(port.try_clone()?)),
            #[cfg(unix)]
            LinkStreamInner::Socket(stream) => Ok(Self {
                inner: LinkStreamInner::Socket(stream.try_clone()?),
            }),
        }
    }

    /// Number of received bytes waiting in the driver's input queue.
    pub fn bytes_to_read(&self) -> Result<u32> {
        match &self.inner {
            LinkStreamInner::Serial(port) => port.bytes_to_read().map_err(Into::into),
            #[cfg(unix)]
            LinkStreamInner::Socket(_) => Err(TransportError::Unsupported {
                kind: self.kind(),
                operation: "bytes_to_read",
            }),
        }
    }

    /// Discard anything queued in the driver's input and output buffers.
    ///
    /// Useful right after opening a board link, which may have printed boot
    /// noise before the host attached.
    pub fn clear_buffers(&self) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Serial(port) => port
                .clear(serialport::ClearBuffer::All)
                .map_err(Into::into),
            #[cfg(unix)]
            LinkStreamInner::Socket(_) => Ok(()),
        }
    }

    /// Device name for diagnostics, when one is known.
    pub fn name(&self) -> Option<String> {
        match &self.inner {
            LinkStreamInner::Serial(port) => port.name(),
            #[cfg(unix)]
            LinkStreamInner::Socket(_) => None,
        }
    }

    /// Stream kind for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            LinkStreamInner::Serial(_) => "serial",
            #[cfg(unix)]
            LinkStreamInner::Socket(_) => "socket-pair",
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}
