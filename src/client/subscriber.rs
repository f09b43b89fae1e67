//! Subscribing client
//!
//! Connects to a relay, declares the `Subscriber` role, and receives every
//! frame the active publisher broadcasts.

use bytes::Bytes;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::Result;
use crate::protocol::frame::{read_frame, DEFAULT_MAX_FRAME_SIZE};
use crate::protocol::handshake::{Greeting, Role};

/// Client side of a subscriber connection
///
/// # Example
/// ```no_run
/// use relay_rs::client::RelaySubscriber;
///
/// # async fn example() -> relay_rs::error::Result<()> {
/// let mut subscriber = RelaySubscriber::connect("127.0.0.1:6070", "viewer-1").await?;
/// while let Some(frame) = subscriber.recv().await? {
///     println!("{} bytes", frame.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct RelaySubscriber {
    stream: TcpStream,
}

impl RelaySubscriber {
    /// Connect and send the subscriber greeting
    pub async fn connect(addr: impl ToSocketAddrs, client_id: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let mut subscriber = Self { stream };

        let greeting = Greeting::new(client_id, Role::Subscriber);
        tokio::io::AsyncWriteExt::write_all(&mut subscriber.stream, &greeting.encode()).await?;

        Ok(subscriber)
    }

    /// Receive the next broadcast frame
    ///
    /// Returns `Ok(None)` when the relay closes the connection.
    pub async fn recv(&mut self) -> Result<Option<Bytes>> {
        read_frame(&mut self.stream, DEFAULT_MAX_FRAME_SIZE).await
    }
}
