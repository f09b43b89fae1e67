//! Publishing client
//!
//! Run with: cargo run --example publish [ADDR]
//!
//! Reads lines from stdin and publishes each one as a frame, printing the
//! relay's status reply.

use tokio::io::{AsyncBufReadExt, BufReader};

use relay_rs::client::RelayPublisher;

#[tokio::main]
async fn main() -> relay_rs::Result<()> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:6070".to_string());

    let mut publisher = RelayPublisher::connect(addr.as_str(), "stdin-feed").await?;
    eprintln!("connected to {addr}, type lines to publish");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let status = publisher.publish(line.as_bytes()).await?;
        eprintln!("{}", String::from_utf8_lossy(&status));
    }

    Ok(())
}
