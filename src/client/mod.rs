//! Client-side connection helpers
//!
//! Thin wrappers over the wire protocol for talking to a relay: one for
//! feeding frames, one for receiving them. The demos and the server's
//! integration tests are built on these.

pub mod publisher;
pub mod subscriber;

pub use publisher::RelayPublisher;
pub use subscriber::RelaySubscriber;
