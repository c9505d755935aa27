//! Host and board halves of the link talking over a socket pair.
//!
//! The board half echoes every frame back, and the host half sends the two
//! messages the bench harness uses and checks the replies. A little line noise
//! is injected before the second frame to show resynchronization.
//!
//! Run with:
//!   cargo run --example loopback

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::io::Write;
    use std::thread;
    use std::time::Duration;

    use muonlink::frame::{FrameConfig, FrameReader, FrameWriter};
    use muonlink::transport::LinkStream;

    let (host, board) = LinkStream::pair()?;
    let config = FrameConfig {
        read_timeout: Some(Duration::from_secs(2)),
        ..FrameConfig::default()
    };

    let board_writer = board.try_clone()?;
    let board_thread = thread::spawn(move || -> muonlink::frame::Result<u64> {
        let mut reader = FrameReader::new(board);
        let mut writer = FrameWriter::new(board_writer);
        loop {
            match reader.read_frame() {
                Ok(frame) => {
                    writer.write_frame(&frame)?;
                }
                Err(muonlink::frame::FrameError::ConnectionClosed) => {
                    return Ok(reader.stats().bytes_discarded);
                }
                Err(err) => return Err(err),
            }
        }
    });

    let mut host_writer = FrameWriter::new(host.try_clone()?);
    let mut host_reader = FrameReader::with_config_link(host, config)?;

    for (i, message) in ["test", "another one"].into_iter().enumerate() {
        if i > 0 {
            host_writer.get_mut().write_all(&[0x13, 0x37, 0x00])?;
        }
        let wire = host_writer.send(message.as_bytes())?;
        eprintln!("sent {message:?} ({wire} bytes on the wire)");

        let reply = host_reader.read_frame()?;
        eprintln!(
            "reply {:?} checksum {}",
            String::from_utf8_lossy(&reply.payload),
            reply.checksum()
        );
        assert_eq!(reply.payload.as_ref(), message.as_bytes());
    }

    drop(host_writer);
    drop(host_reader);
    let discarded = board_thread
        .join()
        .map_err(|_| "board thread panicked")??;
    eprintln!("board discarded {discarded} noise bytes");
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("the loopback example needs Unix socket pairs");
}
