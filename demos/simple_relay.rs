//! Simple relay server
//!
//! Run with: cargo run --example simple_relay [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_relay                  # binds to 0.0.0.0:6070
//!   cargo run --example simple_relay 127.0.0.1:6071
//!
//! Feed it with the `publish` example and watch with `subscribe`.
//! Ctrl-C shuts down gracefully.

use std::net::SocketAddr;

use relay_rs::{RelayConfig, RelayServer};

#[tokio::main]
async fn main() -> relay_rs::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_rs=info,simple_relay=info".into()),
        )
        .init();

    let bind_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:6070".to_string())
        .parse()
        .expect("invalid bind address");

    let server = RelayServer::new(RelayConfig::with_addr(bind_addr));

    tracing::info!(addr = %bind_addr, "[ ctrl+c to stop ]");
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
