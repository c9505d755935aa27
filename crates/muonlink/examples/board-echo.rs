//! Echo frames back on a real serial line, like the board's test firmware.
//!
//! Useful with two USB serial adapters wired back to back: run this on one
//! end and `muonlink send --wait` on the other.
//!
//! Run with:
//!   cargo run --example board-echo -- /dev/ttyUSB1 9600

use muonlink::frame::{FrameConfig, FrameReader, FrameWriter};
use muonlink::transport::{SerialConfig, SerialLink};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: board-echo <PORT> [BAUD]")?;
    let baud_rate = match args.next() {
        Some(baud) => baud.parse()?,
        None => 9600,
    };

    let config = SerialConfig {
        baud_rate,
        settle_delay: std::time::Duration::ZERO,
        ..SerialConfig::default()
    };
    let stream = SerialLink::open_with_config(&path, &config)?;
    let mut writer = FrameWriter::new(stream.try_clone()?);
    let mut reader = FrameReader::with_config_link(stream, FrameConfig::default())?;
    eprintln!("Echoing on {path} at {baud_rate} baud");

    loop {
        if let Some(frame) = reader.poll_frame()? {
            eprintln!("Received {} bytes", frame.payload.len());
            writer.write_frame(&frame)?;
        }
    }
}
