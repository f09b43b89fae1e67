//! Error types for the relay
//!
//! All fallible operations in the crate return [`Result`]. Handshake and
//! framing failures carry their own enums so callers can tell a bad peer
//! (drop the connection) from a transport error.

use std::io;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Malformed role header during connection admission
    Handshake(HandshakeError),
    /// Invalid or truncated length-prefixed frame
    Framing(FramingError),
    /// Underlying transport error
    Io(io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Handshake(e) => write!(f, "handshake error: {}", e),
            Error::Framing(e) => write!(f, "framing error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Handshake(e) => Some(e),
            Error::Framing(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<HandshakeError> for Error {
    fn from(e: HandshakeError) -> Self {
        Error::Handshake(e)
    }
}

impl From<FramingError> for Error {
    fn from(e: FramingError) -> Self {
        Error::Framing(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Error parsing the role header a client sends right after connecting
///
/// Any of these means the connection is dropped without a reply; there is
/// no retry at the protocol level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Stream closed before a complete greeting line arrived
    Incomplete,
    /// Greeting exceeded the fixed size limit without a terminator
    TooLong,
    /// Greeting is not valid UTF-8
    InvalidUtf8,
    /// No `|` separator between client id and role
    MissingDelimiter,
    /// Client id part is empty
    EmptyClientId,
    /// Role is neither `Publisher` nor `Subscriber`
    UnknownRole(String),
}

impl std::fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandshakeError::Incomplete => write!(f, "connection closed mid-greeting"),
            HandshakeError::TooLong => write!(f, "greeting exceeds size limit"),
            HandshakeError::InvalidUtf8 => write!(f, "greeting is not valid UTF-8"),
            HandshakeError::MissingDelimiter => write!(f, "greeting missing '|' delimiter"),
            HandshakeError::EmptyClientId => write!(f, "greeting has empty client id"),
            HandshakeError::UnknownRole(role) => write!(f, "unknown role: {:?}", role),
        }
    }
}

impl std::error::Error for HandshakeError {}

/// Error decoding a length-prefixed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Stream closed after some, but not all, of the 4 header bytes
    TruncatedHeader {
        /// Header bytes read before the close
        read: usize,
    },
    /// Stream closed before the advertised payload length arrived
    TruncatedPayload {
        /// Payload length announced by the header
        expected: usize,
        /// Payload bytes read before the close
        read: usize,
    },
    /// Advertised payload length exceeds the configured bound
    FrameTooLarge {
        /// Advertised length
        len: usize,
        /// Configured maximum
        max: usize,
    },
}

impl std::fmt::Display for FramingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramingError::TruncatedHeader { read } => {
                write!(f, "stream closed after {} of 4 header bytes", read)
            }
            FramingError::TruncatedPayload { expected, read } => {
                write!(f, "stream closed after {} of {} payload bytes", read, expected)
            }
            FramingError::FrameTooLarge { len, max } => {
                write!(f, "frame length {} exceeds maximum {}", len, max)
            }
        }
    }
}

impl std::error::Error for FramingError {}
