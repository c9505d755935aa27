//! Checksummed, length-delimited framing for the muonlink serial link.
//!
//! Both ends of the link speak the same format. Every message is framed with:
//! - A 1-byte header sentinel (`0xF9`)
//! - A 1-byte payload length (0 to 255)
//! - The payload itself
//! - A 2-byte running-sum checksum over the payload
//!
//! The receive side resynchronizes on its own after line noise or corruption;
//! callers only see checksum-valid payloads.

pub mod accumulator;
#[cfg(feature = "async")]
pub mod async_codec;
pub mod checksum;
pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod writer;

pub use accumulator::{Extract, LinkStats, StreamAccumulator};
#[cfg(feature = "async")]
pub use async_codec::LinkCodec;
pub use checksum::{Checksum, RunningSum};
pub use codec::{
    decode_frame, encode_frame, DecodeOutcome, Frame, FrameConfig, FrameSpan, Rejection,
    DEFAULT_MAX_BUFFERED, FRAME_OVERHEAD, HEADER_BYTE, MAX_FRAME_SIZE, MAX_PAYLOAD,
};
pub use command::{ChipCommand, COMMAND_SIZE, MAX_COMMAND, MAX_DATA};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
