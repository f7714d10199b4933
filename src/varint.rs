//! Minecraft varint codec
//!
//! Little-endian base-128 groups: each byte carries 7 value bits, the high
//! bit marks continuation. Values are capped at 5 bytes (35 shifted bits) so
//! hostile peers cannot stream continuation bytes forever.

use crate::error::{GatewayError, ProtocolViolation};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Longest legal encoding of a 32-bit value.
pub const MAX_VARINT_BYTES: usize = 5;

/// Decode a varint from a live stream, one byte at a time.
///
/// A peer that closes mid-integer yields `GatewayError::ConnectionClosed`.
pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u32, GatewayError> {
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_BYTES {
        let byte = reader
            .read_u8()
            .await
            .map_err(GatewayError::from_read_error)?;
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ProtocolViolation::OversizedVarInt.into())
}

/// Decode a varint from an in-memory frame buffer starting at `offset`.
///
/// Returns the value and the offset of the first byte after it.
pub fn decode_varint(buf: &[u8], offset: usize) -> Result<(u32, usize), ProtocolViolation> {
    let mut value: u32 = 0;
    let mut idx = offset;
    for i in 0..MAX_VARINT_BYTES {
        let byte = *buf.get(idx).ok_or(ProtocolViolation::BufferOverrun)?;
        idx += 1;
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, idx));
        }
    }
    Err(ProtocolViolation::OversizedVarInt)
}

/// Encode a value as a varint.
pub fn encode_varint(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_VARINT_BYTES);
    let mut remaining = value;
    loop {
        let mut byte = (remaining & 0x7F) as u8;
        remaining >>= 7;
        if remaining != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if remaining == 0 {
            return out;
        }
    }
}
