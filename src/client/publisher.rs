//! Publishing client
//!
//! Connects to a relay, declares the `Publisher` role, and feeds frames.
//! Each publish is one full round: the frame goes out, the relay's status
//! reply comes back.

use std::io;

use bytes::Bytes;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{Error, Result};
use crate::protocol::frame::{read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE};
use crate::protocol::handshake::{Greeting, Role};

/// Client side of a publisher connection
///
/// # Example
/// ```no_run
/// use relay_rs::client::RelayPublisher;
///
/// # async fn example() -> relay_rs::error::Result<()> {
/// let mut publisher = RelayPublisher::connect("127.0.0.1:6070", "feed-1").await?;
/// let status = publisher.publish(b"market data").await?;
/// println!("relay says: {}", String::from_utf8_lossy(&status));
/// # Ok(())
/// # }
/// ```
pub struct RelayPublisher {
    stream: TcpStream,
}

impl RelayPublisher {
    /// Connect and send the publisher greeting
    pub async fn connect(addr: impl ToSocketAddrs, client_id: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let mut publisher = Self { stream };

        let greeting = Greeting::new(client_id, Role::Publisher);
        tokio::io::AsyncWriteExt::write_all(&mut publisher.stream, &greeting.encode()).await?;

        Ok(publisher)
    }

    /// Publish one frame and wait for the relay's status reply
    ///
    /// The reply payload is UTF-8 text of the form
    /// `Connected subscribers: <count>`.
    pub async fn publish(&mut self, payload: &[u8]) -> Result<Bytes> {
        write_frame(&mut self.stream, payload).await?;

        match read_frame(&mut self.stream, DEFAULT_MAX_FRAME_SIZE).await? {
            Some(status) => Ok(status),
            None => Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "relay closed the connection",
            ))),
        }
    }
}
