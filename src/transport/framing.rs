//! Native messaging frame codec.
//!
//! Each frame is a 32-bit length in native byte order followed by that
//! many bytes of UTF-8 JSON. The same framing is used over a child
//! process's stdio and over the in-memory duplex.

// ============================================================================
// Imports
// ============================================================================

use std::io::ErrorKind;

use futures_util::{sink, stream};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

use super::{FrameSink, FrameStream};

// ============================================================================
// Constants
// ============================================================================

/// Default limit for a single inbound frame (host → bridge), 1 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Size of the length prefix in bytes.
const LENGTH_PREFIX_LEN: usize = 4;

// ============================================================================
// Frame I/O
// ============================================================================

/// Reads one frame.
///
/// Returns `Ok(None)` on a clean end of stream at a frame boundary.
///
/// # Errors
///
/// - [`Error::MessageTooLarge`] if the declared length exceeds `max_size`
/// - [`Error::Protocol`] if the stream ends mid-frame or the body is not UTF-8
/// - [`Error::Io`] on read failure
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_LEN {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::protocol(format!(
                "truncated frame header: {filled} of {LENGTH_PREFIX_LEN} bytes"
            )));
        }
        filled += n;
    }

    let len = u32::from_ne_bytes(prefix) as usize;
    if len > max_size {
        return Err(Error::message_too_large(len, max_size));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            Error::protocol(format!("truncated frame body: expected {len} bytes"))
        } else {
            Error::Io(e)
        }
    })?;

    String::from_utf8(body)
        .map(Some)
        .map_err(|e| Error::protocol(format!("frame is not valid UTF-8: {e}")))
}

/// Writes one frame and flushes.
///
/// # Errors
///
/// - [`Error::MessageTooLarge`] if the frame does not fit a 32-bit length
/// - [`Error::Io`] on write failure
pub async fn write_frame<W>(writer: &mut W, frame: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(frame.len())
        .map_err(|_| Error::message_too_large(frame.len(), u32::MAX as usize))?;

    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

// ============================================================================
// Adapters
// ============================================================================

/// Wraps a reader as a [`FrameStream`].
///
/// The stream yields at most one error and then ends.
pub fn frame_stream<R>(reader: R, max_size: usize) -> FrameStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    Box::pin(stream::unfold(Some(reader), move |state| async move {
        let mut reader = state?;
        match read_frame(&mut reader, max_size).await {
            Ok(Some(frame)) => Some((Ok(frame), Some(reader))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    }))
}

/// Wraps a writer as a [`FrameSink`].
pub fn frame_sink<W>(writer: W) -> FrameSink
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    Box::pin(sink::unfold(writer, |mut writer: W, frame: String| async move {
        write_frame(&mut writer, &frame).await?;
        Ok::<_, Error>(writer)
    }))
}

// ============================================================================
// Tests
// ============================================================================
