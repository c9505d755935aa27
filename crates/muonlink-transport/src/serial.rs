use std::path::{Path, PathBuf};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// Baud rate the host side uses by default.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read timeout after which a poll reports "no new data this cycle".
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// The board resets when the port opens and ignores input until its bootloader exits.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1300);

/// Line settings for a board link.
///
/// Framing is always 8N1 without flow control; only the fields below vary.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Line speed in baud.
    pub baud_rate: u32,
    /// Timeout for a single read (and write) on the device.
    pub read_timeout: Duration,
    /// Hold the device exclusively (Unix `TIOCEXCL`). Ignored elsewhere.
    pub exclusive: bool,
    /// Time to wait after opening before the link is handed out.
    pub settle_delay: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            exclusive: true,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Serial device transport.
pub struct SerialLink;

impl SerialLink {
    /// Open a serial device with default line settings.
    pub fn open(path: impl AsRef<Path>) -> Result<LinkStream> {
        Self::open_with_config(path, &SerialConfig::default())
    }

    /// Open a serial device with explicit line settings.
    pub fn open_with_config(path: impl AsRef<Path>, config: &SerialConfig) -> Result<LinkStream> {
        let path = path.as_ref().to_path_buf();
        let name = path.to_string_lossy().into_owned();

        let builder = serialport::new(name, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout);

        let port = open_port(builder, &path, config.exclusive)?;
        info!(?path, baud = config.baud_rate, "opened serial link");

        if !config.settle_delay.is_zero() {
            debug!(delay = ?config.settle_delay, "waiting for board to settle");
            std::thread::sleep(config.settle_delay);
        }

        let stream = LinkStream::from_serial(port);
        // Drop whatever the board printed while resetting.
        stream.clear_buffers()?;
        Ok(stream)
    }

    /// Transport name for diagnostics.
    pub fn transport_name() -> &'static str {
        "serial"
    }
}

#[cfg(unix)]
fn open_port(
    builder: serialport::SerialPortBuilder,
    path: &Path,
    exclusive: bool,
) -> Result<Box<dyn serialport::SerialPort>> {
    let mut port = builder.open_native().map_err(|source| TransportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    port.set_exclusive(exclusive)
        .map_err(|source| TransportError::Configure {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Box::new(port))
}

#[cfg(not(unix))]
fn open_port(
    builder: serialport::SerialPortBuilder,
    path: &Path,
    _exclusive: bool,
) -> Result<Box<dyn serialport::SerialPort>> {
    builder.open().map_err(|source| TransportError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// A serial device visible to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub path: PathBuf,
    pub kind: &'static str,
    /// Manufacturer/product string for USB adapters.
    pub description: Option<String>,
}

/// Enumerate serial devices the host can open.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    debug!(count = ports.len(), "enumerated serial ports");
    Ok(ports.into_iter().map(port_info).collect())
}

fn port_info(info: serialport::SerialPortInfo) -> PortInfo {
    let (kind, description) = match info.port_type {
        SerialPortType::UsbPort(usb) => {
            let description = match (usb.manufacturer, usb.product) {
                (Some(m), Some(p)) => Some(format!("{m} {p}")),
                (Some(m), None) => Some(m),
                (None, Some(p)) => Some(p),
                (None, None) => Some(format!("{:04x}:{:04x}", usb.vid, usb.pid)),
            };
            ("usb", description)
        }
        SerialPortType::PciPort => ("pci", None),
        SerialPortType::BluetoothPort => ("bluetooth", None),
        SerialPortType::Unknown => ("unknown", None),
    };
    PortInfo {
        path: PathBuf::from(info.port_name),
        kind,
        description,
    }
}
