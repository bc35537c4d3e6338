//! Length-delimited packet framing over a byte stream
//!
//! Each frame is a 4-byte big-endian length followed by a bincode-encoded
//! `Packet`. Reads refuse lengths above `MAX_FRAME_SIZE` so a corrupt or
//! hostile prefix cannot force a large allocation.

use crate::Packet;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame payload (1 MiB). A question with its choices is a few hundred bytes.
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// Serializes a packet into a complete frame (length prefix included)
pub fn encode_frame(packet: &Packet) -> io::Result<Vec<u8>> {
    let payload = bincode::serialize(packet)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "frame too large: {} bytes (max {})",
                payload.len(),
                MAX_FRAME_SIZE
            ),
        ));
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Writes one packet as a frame and flushes the writer
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(packet)?;
    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Reads one frame and decodes it.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary,
/// `UnexpectedEof` when it ends mid-frame and `InvalidData` for oversized or
/// undecodable frames.
pub async fn read_packet<R>(reader: &mut R) -> io::Result<Option<Packet>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed inside a frame header",
            ));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes (max {})", len, MAX_FRAME_SIZE),
        ));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    bincode::deserialize(&payload)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
