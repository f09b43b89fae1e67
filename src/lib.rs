//! One-to-many TCP message relay
//!
//! Exactly one active publisher feeds length-prefixed binary frames; the
//! relay fans each frame out to every connected subscriber and reports the
//! live subscriber count back to the publisher after each round.
//!
//! # Architecture
//!
//! ```text
//!                         ┌──────────────────┐
//!        accept ─────────►│    Dispatcher    │ role header: "<id>|<role>"
//!                         └───────┬──────────┘
//!                 Publisher       │       Subscriber
//!              ┌──────────────────┴────────────────┐
//!              ▼                                   ▼
//!      ┌───────────────┐                 ┌──────────────────────┐
//!      │ PublisherSlot │                 │  SubscriberRegistry  │
//!      │ (at most one  │                 │  add / remove /      │
//!      │  active loop) │                 │  snapshot / count    │
//!      └───────┬───────┘                 └──────────┬───────────┘
//!              ▼                                    │
//!      ┌───────────────┐   one frame per round     │
//!      │Broadcast Engine│──────────────────────────►│ bounded fan-out
//!      └───────┬───────┘                            ▼
//!              └──── status frame ───────►  [Subscriber] [Subscriber] …
//! ```
//!
//! A publisher connecting while another is active signals the holder to
//! yield (cooperative preemption, polled between frames); the last
//! publisher to connect eventually wins the slot. Subscriber failures are
//! isolated per connection: a dead subscriber is dropped from the
//! registry, the rest of the round is unaffected, and the publisher only
//! sees the updated count.
//!
//! # Example
//!
//! ```no_run
//! use relay_rs::{RelayConfig, RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> relay_rs::error::Result<()> {
//!     let config = RelayConfig::with_addr("127.0.0.1:6070".parse().unwrap());
//!     let server = RelayServer::new(config);
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use error::{Error, Result};
pub use protocol::{Greeting, Role};
pub use server::{RelayConfig, RelayServer};
