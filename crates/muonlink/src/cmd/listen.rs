use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::cmd::ListenArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let (mut reader, _writer) = args.serial.open()?;
    let source = args.serial.port_name();

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let frame = match reader.poll_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        print_frame(&frame, &source, args.chip_commands, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    let stats = reader.stats();
    info!(
        decoded = stats.frames_decoded,
        rejected = stats.frames_rejected,
        discarded = stats.bytes_discarded,
        "listen finished"
    );
    Ok(SUCCESS)
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
