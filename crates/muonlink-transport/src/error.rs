use std::path::PathBuf;

/// Errors that can occur in link transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the specified serial device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: serialport::Error,
    },

    /// The device opened but rejected a line or timeout setting.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: serialport::Error,
    },

    /// A serial port driver error outside of open/configure.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation is not available for this stream kind.
    #[error("unsupported on {kind} stream: {operation}")]
    Unsupported {
        kind: &'static str,
        operation: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// True when the OS refused access to the device (wrong group, no udev rule).
    pub fn is_permission_denied(&self) -> bool {
        let denied = serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied);
        match self {
            TransportError::Open { source, .. }
            | TransportError::Configure { source, .. }
            | TransportError::Serial(source) => source.kind() == denied,
            TransportError::Io(err) => err.kind() == std::io::ErrorKind::PermissionDenied,
            TransportError::Unsupported { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_detected_through_serial_errors() {
        let err = TransportError::Open {
            path: PathBuf::from("/dev/ttyACM0"),
            source: serialport::Error::new(
                serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
                "Permission denied",
            ),
        };
        assert!(err.is_permission_denied());

        let err = TransportError::Open {
            path: PathBuf::from("/dev/ttyACM9"),
            source: serialport::Error::new(serialport::ErrorKind::NoDevice, "gone"),
        };
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn open_error_names_the_device() {
        let err = TransportError::Open {
            path: PathBuf::from("/dev/ttyUSB3"),
            source: serialport::Error::new(serialport::ErrorKind::NoDevice, "gone"),
        };
        assert!(err.to_string().starts_with("failed to open /dev/ttyUSB3"));
    }
}
