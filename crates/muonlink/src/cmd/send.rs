use std::io::Read;
use std::time::Duration;

use muonlink_frame::{Frame, FrameReader};
use tracing::info;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    if args.wait && wait_timeout.is_zero() {
        return Err(CliError::new(USAGE, "--wait-timeout must be greater than zero"));
    }
    let payload = args.payload.resolve()?;

    let (mut reader, mut writer) = args.serial.open()?;
    let written = writer
        .send(&payload)
        .map_err(|err| frame_error("send failed", err))?;
    info!(size = payload.len(), wire = written, "frame sent");

    if args.wait {
        let frame = wait_for_reply(&mut reader, wait_timeout)?;
        print_frame(&frame, &args.serial.port_name(), false, format);
    }

    Ok(SUCCESS)
}

fn wait_for_reply<R: Read>(reader: &mut FrameReader<R>, timeout: Duration) -> CliResult<Frame> {
    match reader.recv_timeout(timeout) {
        Ok(Some(frame)) => Ok(frame),
        Ok(None) => Err(CliError::new(
            TIMEOUT,
            format!("no reply within {}ms", timeout.as_millis()),
        )),
        Err(err) => Err(frame_error("receive failed", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn wait_for_reply_returns_first_valid_frame() {
        let mut wire = vec![0x00, 0xF9, 0x01, 0x41, 0x00, 0x00];
        wire.extend_from_slice(&Frame::new(&b"pong"[..]).to_wire().unwrap());
        let mut reader = FrameReader::new(Cursor::new(wire));

        let frame = wait_for_reply(&mut reader, Duration::from_millis(50)).unwrap();
        assert_eq!(frame.payload.as_ref(), b"pong");
        assert_eq!(reader.stats().frames_rejected, 1);
    }

    #[test]
    fn wait_for_reply_times_out_on_silence() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()));
        let err = wait_for_reply(&mut reader, Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }
}
