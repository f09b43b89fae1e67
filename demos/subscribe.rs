//! Subscribing client
//!
//! Run with: cargo run --example subscribe [ADDR]
//!
//! Prints every frame broadcast by the relay until the connection closes.

use relay_rs::client::RelaySubscriber;

#[tokio::main]
async fn main() -> relay_rs::Result<()> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:6070".to_string());

    let mut subscriber = RelaySubscriber::connect(addr.as_str(), "stdout-viewer").await?;
    eprintln!("connected to {addr}");

    while let Some(frame) = subscriber.recv().await? {
        println!("{}", String::from_utf8_lossy(&frame));
    }

    eprintln!("relay closed the connection");
    Ok(())
}
