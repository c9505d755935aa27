//! Byte transports for the muonlink serial link.
//!
//! Provides a unified interface over the ways a link endpoint can be reached:
//! - OS serial devices (USB CDC boards, UART adapters)
//! - Connected socket pairs (Unix), used as a stand-in for the cable
//!
//! This is the lowest layer of muonlink. Everything else builds on top of
//! the [`LinkStream`] type provided here; nothing in this crate knows about frames.

pub mod error;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use serial::{
    available_ports, PortInfo, SerialConfig, SerialLink, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT,
    DEFAULT_SETTLE_DELAY,
};
pub use traits::LinkStream;
