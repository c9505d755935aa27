use muonlink_frame::{Extract, StreamAccumulator};
use tracing::debug;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_frame, print_rejection, print_stats, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.input.join(" "))?;
    debug!(size = bytes.len(), "decoding captured bytes");

    let mut acc = StreamAccumulator::with_max_buffered(args.max_buffered);
    acc.feed(&bytes);

    loop {
        match acc.extract() {
            Extract::Frame(frame) => print_frame(&frame, "input", args.chip_commands, format),
            Extract::Rejected(rejection) => print_rejection(&rejection, format),
            Extract::Pending => break,
        }
    }

    let stats = acc.stats();
    print_stats(stats, acc.len(), format);

    if stats.frames_decoded == 0 {
        return Err(CliError::new(FAILURE, "no valid frame in input"));
    }
    Ok(SUCCESS)
}
