//! Host-side tooling for the MuonPi payload board serial link.
//!
//! The board and the host exchange commands and telemetry as checksummed,
//! length-delimited frames over a point-to-point serial line.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte transports (serial devices, socket pairs)
//! - [`frame`]: Frame codec, receive accumulator, blocking reader/writer,
//!   chip command payloads, and the `tokio_util` codec (behind `async` feature)

/// Re-export transport types.
pub mod transport {
    pub use muonlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use muonlink_frame::*;
}
