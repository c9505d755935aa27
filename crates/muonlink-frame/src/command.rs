//! Chip command payloads.
//!
//! The host drives the detector ASICs on the payload board through 4-byte
//! frame payloads, and the board answers in the same layout:
//!
//! ```text
//! byte 0: multiplexer address
//! byte 1: cccc 00 d9 d8   (4-bit command, two reserved bits, data bits 9..8)
//! byte 2: data bits 7..0
//! byte 3: chip id
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{FrameError, Result};

/// Size of a chip command payload.
pub const COMMAND_SIZE: usize = 4;

/// Largest value of the 4-bit command field.
pub const MAX_COMMAND: u8 = 0x0F;

/// Largest value of the 10-bit data field.
pub const MAX_DATA: u16 = 0x03FF;

/// One ASIC command or reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipCommand {
    pub multiplexer: u8,
    command: u8,
    data: u16,
    pub chip_id: u8,
}

impl ChipCommand {
    pub fn new(multiplexer: u8, command: u8, data: u16, chip_id: u8) -> Result<Self> {
        if command > MAX_COMMAND {
            return Err(FrameError::InvalidCommand(format!(
                "command {command:#x} exceeds 4 bits"
            )));
        }
        if data > MAX_DATA {
            return Err(FrameError::InvalidCommand(format!(
                "data {data:#x} exceeds 10 bits"
            )));
        }
        Ok(Self {
            multiplexer,
            command,
            data,
            chip_id,
        })
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn data(&self) -> u16 {
        self.data
    }

    pub fn to_payload(&self) -> [u8; COMMAND_SIZE] {
        [
            self.multiplexer,
            (self.command << 4) | ((self.data >> 8) as u8 & 0x03),
            (self.data & 0xFF) as u8,
            self.chip_id,
        ]
    }

    /// Unpack a received payload. The reserved bits are ignored.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let bytes: [u8; COMMAND_SIZE] = payload.try_into().map_err(|_| {
            FrameError::InvalidCommand(format!(
                "expected {COMMAND_SIZE} payload bytes, got {}",
                payload.len()
            ))
        })?;
        Ok(Self {
            multiplexer: bytes[0],
            command: bytes[1] >> 4,
            data: (u16::from(bytes[1] & 0x03) << 8) | u16::from(bytes[2]),
            chip_id: bytes[3],
        })
    }
}

impl fmt::Display for ChipCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.multiplexer, self.command, self.data, self.chip_id
        )
    }
}

/// Parses `MUX:CMD:DATA:CHIP`, each field decimal or `0x`-prefixed hex.
impl FromStr for ChipCommand {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split(':').map(str::trim).collect();
        let [mux, cmd, data, chip] = fields.as_slice() else {
            return Err(FrameError::InvalidCommand(format!(
                "expected MUX:CMD:DATA:CHIP, got {s:?}"
            )));
        };

        let multiplexer = parse_field(mux, "multiplexer")?;
        let command = parse_field(cmd, "command")?;
        let data = parse_field(data, "data")?;
        let chip_id = parse_field(chip, "chip id")?;

        let narrow = |value: u32, name: &str| {
            u8::try_from(value)
                .map_err(|_| FrameError::InvalidCommand(format!("{name} {value} exceeds 8 bits")))
        };
        let data = u16::try_from(data)
            .map_err(|_| FrameError::InvalidCommand(format!("data {data} exceeds 10 bits")))?;

        Self::new(
            narrow(multiplexer, "multiplexer")?,
            narrow(command, "command")?,
            data,
            narrow(chip_id, "chip id")?,
        )
    }
}

fn parse_field(text: &str, name: &str) -> Result<u32> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| FrameError::InvalidCommand(format!("invalid {name} {text:?}")))
}
