//! u32 little-endian length-prefixed frames carrying bincode payloads.

use arbor_core::codec::{self, bincode_options_limited};
use arbor_core::CodecError;
use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtoError;
use crate::MAX_MESSAGE_BYTES;

pub const DEFAULT_MAX_FRAME_LEN: u32 = MAX_MESSAGE_BYTES as u32;

/// Encode `message` into a complete frame (length prefix included).
pub fn encode_framed_message<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtoError> {
    let payload = codec::encode(message)?;
    let len = checked_len(payload.len(), DEFAULT_MAX_FRAME_LEN)?;
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode one complete frame. Truncated frames, oversized length prefixes and
/// trailing bytes are all errors.
pub fn decode_framed_message<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtoError> {
    let Some((prefix, payload)) = bytes.split_first_chunk::<4>() else {
        return Err(ProtoError::ConnectionClosed);
    };
    let len = u32::from_le_bytes(*prefix);
    if len > DEFAULT_MAX_FRAME_LEN {
        return Err(ProtoError::FrameTooLarge {
            len: u64::from(len),
            max: DEFAULT_MAX_FRAME_LEN,
        });
    }
    if payload.len() != len as usize {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame declares {len} bytes but carries {}", payload.len()),
        )
        .into());
    }
    decode_payload(payload)
}

pub async fn write_frame(
    stream: &mut (impl AsyncWrite + Unpin),
    max_frame_len: u32,
    payload: &[u8],
) -> Result<(), ProtoError> {
    let len = checked_len(payload.len(), max_frame_len)?;
    stream.write_u32_le(len).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one frame payload. A clean EOF before the length prefix is
/// [`ProtoError::ConnectionClosed`].
pub async fn read_frame(
    stream: &mut (impl AsyncRead + Unpin),
    max_frame_len: u32,
) -> Result<Vec<u8>, ProtoError> {
    let len = match stream.read_u32_le().await {
        Ok(len) => len,
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtoError::ConnectionClosed)
        }
        Err(err) => return Err(err.into()),
    };
    if len > max_frame_len {
        return Err(ProtoError::FrameTooLarge {
            len: u64::from(len),
            max: max_frame_len,
        });
    }

    // Reserve fallibly so allocation failure surfaces as an error instead of aborting the process.
    let len_usize = len as usize;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len_usize)
        .map_err(|err| ProtoError::AllocationFailed {
            message: format!("allocate frame buffer ({len} bytes): {err}"),
        })?;
    buf.resize(len_usize, 0);
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}

pub async fn send_message<T: Serialize>(
    stream: &mut (impl AsyncWrite + Unpin),
    max_frame_len: u32,
    message: &T,
) -> Result<(), ProtoError> {
    let payload = codec::encode(message)?;
    write_frame(stream, max_frame_len, &payload).await
}

pub async fn recv_message<T: DeserializeOwned>(
    stream: &mut (impl AsyncRead + Unpin),
    max_frame_len: u32,
) -> Result<T, ProtoError> {
    let payload = read_frame(stream, max_frame_len).await?;
    decode_payload(&payload)
}

fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtoError> {
    bincode_options_limited()
        .reject_trailing_bytes()
        .deserialize(payload)
        .map_err(|err| ProtoError::Codec(CodecError::from(err)))
}

fn checked_len(len: usize, max: u32) -> Result<u32, ProtoError> {
    match u32::try_from(len) {
        Ok(len) if len <= max => Ok(len),
        _ => Err(ProtoError::FrameTooLarge {
            len: len as u64,
            max,
        }),
    }
}
