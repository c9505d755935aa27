use muonlink_frame::Frame;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_wire, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = Frame::new(args.payload.resolve()?);
    let wire = frame
        .to_wire()
        .map_err(|err| frame_error("encode failed", err))?;
    print_wire(&frame, &wire, format);
    Ok(SUCCESS)
}
