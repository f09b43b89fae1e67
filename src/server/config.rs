//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::protocol::frame::DEFAULT_MAX_FRAME_SIZE;

/// Relay server configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Greeting must arrive within this window or the connection is dropped
    pub handshake_timeout: Duration,

    /// Bounded read timeout on the publisher connection
    ///
    /// This is the polling interval at which a session re-checks the
    /// shutdown and preemption flags, so it bounds how long termination
    /// and hand-off can take.
    pub poll_interval: Duration,

    /// Sleep between slot acquisition attempts by a waiting publisher
    pub handoff_retry_interval: Duration,

    /// Cap on a single frame's payload size
    pub max_frame_size: usize,

    /// Upper bound on concurrent subscriber writes within one round
    pub fanout_concurrency: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:6070".parse().unwrap(),
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            handoff_retry_interval: Duration::from_millis(100),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            fanout_concurrency: 64,
            tcp_nodelay: true, // Important for low latency
        }
    }
}

impl RelayConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the publisher read poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the hand-off retry interval
    pub fn handoff_retry_interval(mut self, interval: Duration) -> Self {
        self.handoff_retry_interval = interval;
        self
    }

    /// Set the maximum frame payload size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the fan-out worker pool bound
    ///
    /// Clamped to at least 1.
    pub fn fanout_concurrency(mut self, limit: usize) -> Self {
        self.fanout_concurrency = limit.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();

        assert_eq!(config.bind_addr.port(), 6070);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(config.fanout_concurrency, 64);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:6071".parse().unwrap();
        let config = RelayConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 6071);
    }

    #[test]
    fn test_builder_fanout_concurrency_floor() {
        let config = RelayConfig::default().fanout_concurrency(0);

        assert_eq!(config.fanout_concurrency, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:6070".parse().unwrap();
        let config = RelayConfig::default()
            .bind(addr)
            .max_connections(50)
            .handshake_timeout(Duration::from_secs(5))
            .poll_interval(Duration::from_millis(200))
            .handoff_retry_interval(Duration::from_millis(20))
            .max_frame_size(1024)
            .fanout_concurrency(8);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.handoff_retry_interval, Duration::from_millis(20));
        assert_eq!(config.max_frame_size, 1024);
        assert_eq!(config.fanout_concurrency, 8);
    }
}
