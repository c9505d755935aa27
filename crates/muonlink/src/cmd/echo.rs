use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use muonlink_frame::{FrameReader, FrameWriter};
use tracing::info;

use crate::cmd::listen::install_ctrlc_handler;
use crate::cmd::EchoArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let (mut reader, mut writer) = args.serial.open()?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(port = %args.serial.port_name(), "echoing frames");
    while running.load(Ordering::SeqCst) {
        echo_once(&mut reader, &mut writer)?;
    }

    let stats = reader.stats();
    info!(
        decoded = stats.frames_decoded,
        rejected = stats.frames_rejected,
        discarded = stats.bytes_discarded,
        "echo finished"
    );
    Ok(SUCCESS)
}

/// Poll once and send back whatever frame arrived. Returns whether one did.
fn echo_once<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
) -> CliResult<bool> {
    let frame = match reader.poll_frame() {
        Ok(Some(frame)) => frame,
        Ok(None) => return Ok(false),
        Err(err) => return Err(frame_error("receive failed", err)),
    };

    info!(size = frame.payload.len(), "echoing frame");
    writer
        .write_frame(&frame)
        .map_err(|err| frame_error("echo send failed", err))?;
    Ok(true)
}
