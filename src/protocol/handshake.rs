//! Connection handshake
//!
//! Immediately after connecting, a client sends a single greeting line:
//!
//! ```text
//! <client_id>|<role>\n
//! ```
//!
//! where `role` is `Publisher` or `Subscriber`. The greeting is plain UTF-8,
//! newline-terminated, and capped at [`MAX_GREETING_SIZE`] bytes. Nothing
//! else is exchanged before the data phase; a malformed greeting means the
//! connection is dropped without a reply.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{HandshakeError, Result};

/// Maximum size of the greeting line, terminator included
pub const MAX_GREETING_SIZE: usize = 128;

/// Connection role declared in the greeting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Feeds frames for broadcast; at most one active at a time
    Publisher,
    /// Receives broadcast frames
    Subscriber,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Publisher => "Publisher",
            Role::Subscriber => "Subscriber",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = HandshakeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Publisher" => Ok(Role::Publisher),
            "Subscriber" => Ok(Role::Subscriber),
            other => Err(HandshakeError::UnknownRole(other.to_string())),
        }
    }
}

/// Parsed greeting line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Opaque client identifier, used only for logging
    pub client_id: String,
    /// Declared role
    pub role: Role,
}

impl Greeting {
    /// Create a greeting
    pub fn new(client_id: impl Into<String>, role: Role) -> Self {
        Self {
            client_id: client_id.into(),
            role,
        }
    }

    /// Parse a greeting line (terminator already stripped)
    pub fn parse(line: &str) -> std::result::Result<Self, HandshakeError> {
        let (client_id, role) = line
            .split_once('|')
            .ok_or(HandshakeError::MissingDelimiter)?;

        if client_id.is_empty() {
            return Err(HandshakeError::EmptyClientId);
        }

        Ok(Self {
            client_id: client_id.to_string(),
            role: role.parse()?,
        })
    }

    /// Encode the greeting as wire bytes, terminator included
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.client_id.len() + self.role.as_str().len() + 2);
        buf.put_slice(self.client_id.as_bytes());
        buf.put_u8(b'|');
        buf.put_slice(self.role.as_str().as_bytes());
        buf.put_u8(b'\n');
        buf.freeze()
    }
}

/// Read and parse the greeting line from a freshly accepted stream
///
/// Reads byte-by-byte up to the newline. The greeting is a handful of bytes
/// sent once per connection, so the per-byte reads are not worth optimizing
/// around.
pub async fn read_greeting<R>(reader: &mut R) -> Result<Greeting>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::with_capacity(32);

    loop {
        let mut byte = [0u8; 1];
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            return Err(HandshakeError::Incomplete.into());
        }
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
        if line.len() >= MAX_GREETING_SIZE {
            return Err(HandshakeError::TooLong.into());
        }
    }

    let line = std::str::from_utf8(&line).map_err(|_| HandshakeError::InvalidUtf8)?;
    Ok(Greeting::parse(line.trim_end_matches('\r'))?)
}
