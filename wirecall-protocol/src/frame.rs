//! Frames: one header followed by one body.
//!
//! The body is the compressed, serialized payload. `Frame` itself does
//! not interpret it; see [`crate::codec`] for payload handling.

use crate::error::ProtocolError;
use crate::header::{Header, HEADER_SIZE};
use crate::MAX_FRAME_SIZE;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A header plus its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub body: Bytes,
}

impl Frame {
    /// Creates a frame, computing `full_length` from the body.
    pub fn new(mut header: Header, body: Bytes) -> Self {
        header.full_length = (HEADER_SIZE + body.len()) as u32;
        Self { header, body }
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let total = HEADER_SIZE + self.body.len();
        if total > MAX_FRAME_SIZE as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: total.min(u32::MAX as usize) as u32,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut header = self.header;
        header.full_length = total as u32;

        let mut buf = BytesMut::with_capacity(total);
        header.put(&mut buf);
        buf.extend_from_slice(&self.body);
        Ok(buf)
    }

    /// Decodes a frame from a buffer.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&buf[..HEADER_SIZE]);
        let header = Header::parse(&raw)?;

        if buf.len() < header.full_length as usize {
            return Ok(None);
        }

        buf.advance(HEADER_SIZE);
        let body = buf.split_to(header.body_len()).freeze();

        Ok(Some(Self { header, body }))
    }
}

/// Reads exactly one frame from a stream.
///
/// The header is validated before any body byte is read, so a bad magic
/// number never causes the body to be consumed.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; HEADER_SIZE];
    reader.read_exact(&mut raw).await?;
    let header = Header::parse(&raw)?;

    let mut body = vec![0u8; header.body_len()];
    reader.read_exact(&mut body).await?;

    Ok(Frame {
        header,
        body: Bytes::from(body),
    })
}

/// Writes one frame to a stream and flushes it.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = frame.encode()?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
