//! Length-prefixed frame codec
//!
//! Every message in the data phase is a frame:
//!
//! ```text
//! +--------------------+------------------+
//! | length: u32 (BE)   | payload          |
//! | 4 bytes            | `length` bytes   |
//! +--------------------+------------------+
//! ```
//!
//! The length is the exact byte count of the payload. Each [`read_frame`]
//! call consumes exactly one frame from the stream (or reports end of
//! stream); no partial-frame state is kept between calls.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{FramingError, Result};

/// Size of the big-endian length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default cap on a single frame's payload (16 MiB)
///
/// The wire format allows lengths up to `u32::MAX`; the cap exists so a
/// misbehaving peer cannot make the relay allocate unbounded memory.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Encode a payload as a length-prefixed frame
///
/// Infallible: any payload that fits in memory has a valid encoding.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Read one frame from the stream
///
/// Returns `Ok(None)` if the stream is cleanly closed at a frame boundary
/// (zero bytes available where a header would start). A close anywhere
/// inside a frame is a [`FramingError`], as is a length over
/// `max_frame_size`.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; LENGTH_PREFIX_SIZE];
    let n = reader.read(&mut header).await?;
    if n == 0 {
        // Clean close at a frame boundary
        return Ok(None);
    }

    Ok(Some(finish_frame(reader, header, n, max_frame_size).await?))
}

/// Outcome of an idle-aware frame read
#[derive(Debug)]
pub enum FrameRead {
    /// A complete frame arrived
    Frame(Bytes),
    /// Stream closed cleanly at a frame boundary
    EndOfStream,
    /// No frame started within the idle window
    Idle,
}

/// Read one frame, yielding [`FrameRead::Idle`] if none starts in time
///
/// Only the wait for the first byte is bounded by `idle_timeout`; that
/// single `read` is cancel safe, so an expired window consumes nothing
/// from the stream. Once a frame has started, the rest of it is read
/// without a deadline so a slow frame is never torn mid-header.
pub async fn read_frame_or_idle<R>(
    reader: &mut R,
    max_frame_size: usize,
    idle_timeout: Duration,
) -> Result<FrameRead>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; LENGTH_PREFIX_SIZE];
    let n = match timeout(idle_timeout, reader.read(&mut header)).await {
        Err(_elapsed) => return Ok(FrameRead::Idle),
        Ok(n) => n?,
    };
    if n == 0 {
        return Ok(FrameRead::EndOfStream);
    }

    let payload = finish_frame(reader, header, n, max_frame_size).await?;
    Ok(FrameRead::Frame(payload))
}

async fn finish_frame<R>(
    reader: &mut R,
    mut header: [u8; LENGTH_PREFIX_SIZE],
    mut read: usize,
    max_frame_size: usize,
) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    while read < LENGTH_PREFIX_SIZE {
        let n = reader.read(&mut header[read..]).await?;
        if n == 0 {
            return Err(FramingError::TruncatedHeader { read }.into());
        }
        read += n;
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_frame_size {
        return Err(FramingError::FrameTooLarge {
            len,
            max: max_frame_size,
        }
        .into());
    }

    let mut payload = BytesMut::zeroed(len);
    let mut read = 0;

    while read < len {
        let n = reader.read(&mut payload[read..]).await?;
        if n == 0 {
            return Err(FramingError::TruncatedPayload {
                expected: len,
                read,
            }
            .into());
        }
        read += n;
    }

    Ok(payload.freeze())
}

/// Encode and write one frame, flushing the stream
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode(payload)).await?;
    writer.flush().await?;
    Ok(())
}
