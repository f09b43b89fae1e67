//! Relay server
//!
//! Accept loop, connection dispatcher, and configuration.

pub mod config;
pub mod listener;

pub use config::RelayConfig;
pub use listener::RelayServer;
