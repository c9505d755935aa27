//! The loopback example on tokio: `LinkCodec` over an in-memory duplex pipe.
//!
//! Run with:
//!   cargo run --example async-loopback --features async

use futures_util::{SinkExt, StreamExt};
use tokio_util::codec::{FramedRead, FramedWrite};

use muonlink::frame::LinkCodec;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (host, board) = tokio::io::duplex(256);
    let (host_rx, host_tx) = tokio::io::split(host);
    let (board_rx, board_tx) = tokio::io::split(board);

    let board_task = tokio::spawn(async move {
        let mut frames = FramedRead::new(board_rx, LinkCodec::new());
        let mut replies = FramedWrite::new(board_tx, LinkCodec::new());
        while let Some(frame) = frames.next().await {
            replies.send(frame?).await?;
        }
        Ok::<_, muonlink::frame::FrameError>(frames.decoder().stats())
    });

    let mut requests = FramedWrite::new(host_tx, LinkCodec::new());
    let mut replies = FramedRead::new(host_rx, LinkCodec::new());

    for message in ["test", "another one"] {
        requests.send(message.as_bytes()).await?;
        let reply = replies.next().await.ok_or("board hung up")??;
        eprintln!(
            "reply {:?} checksum {}",
            String::from_utf8_lossy(&reply.payload),
            reply.checksum()
        );
    }

    SinkExt::<&[u8]>::close(&mut requests).await?;
    let stats = board_task.await??;
    eprintln!("board decoded {} frames", stats.frames_decoded);
    Ok(())
}
