//! Subscriber connection handle
//!
//! One [`Subscriber`] per registered downstream connection. The write half
//! of the socket lives behind its own async mutex so concurrent broadcast
//! rounds can never interleave bytes on the same stream; the registry hands
//! out `Arc<Subscriber>` clones so a snapshot stays valid while the entry
//! is being removed.

use std::net::SocketAddr;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, OwnedSemaphorePermit};

use crate::error::Result;

/// Boxed write half of a subscriber connection
pub type SubscriberWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A registered subscriber connection
pub struct Subscriber {
    /// Server-assigned session id
    id: u64,
    /// Remote peer address
    peer_addr: SocketAddr,
    /// Client id from the greeting
    client_id: String,
    /// Write half of the connection; the read half is dropped on admission
    writer: Mutex<SubscriberWriter>,
    /// Connection-limit permit, held until the subscriber is removed
    _permit: Option<OwnedSemaphorePermit>,
}

impl Subscriber {
    /// Create a subscriber handle around the write half of its connection
    pub fn new(
        id: u64,
        peer_addr: SocketAddr,
        client_id: impl Into<String>,
        writer: SubscriberWriter,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            id,
            peer_addr,
            client_id: client_id.into(),
            writer: Mutex::new(writer),
            _permit: permit,
        }
    }

    /// Server-assigned session id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Client id from the greeting
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Write pre-encoded frame bytes to this subscriber
    ///
    /// The payload is encoded once per broadcast round; every subscriber
    /// writes the same `Bytes`-backed buffer.
    pub(crate) async fn send(&self, encoded: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(encoded).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("client_id", &self.client_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::io::AsyncReadExt;

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 6070)
    }

    #[tokio::test]
    async fn test_send_reaches_peer() {
        let (near, mut far) = tokio::io::duplex(64);
        let subscriber = Subscriber::new(1, test_addr(), "viewer-1", Box::new(near), None);

        subscriber.send(b"payload").await.unwrap();

        let mut buf = [0u8; 7];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"payload");
    }

    #[tokio::test]
    async fn test_send_to_closed_peer_fails() {
        let (near, far) = tokio::io::duplex(64);
        let subscriber = Subscriber::new(1, test_addr(), "viewer-1", Box::new(near), None);

        drop(far);

        let result = subscriber.send(b"payload").await;
        assert!(result.is_err());
    }
}
