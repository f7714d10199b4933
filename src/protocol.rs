//! Wire framing and handshake classification
//!
//! Every packet on the wire is `varint(total_length) || varint(packet_id) ||
//! payload`. The handshake is the first frame a fresh connection sends; it is
//! parsed exactly once, before any other read, to decide whether the client
//! wants a status answer or an actual login.

use crate::error::{GatewayError, ProtocolViolation};
use crate::varint::{decode_varint, encode_varint, read_varint};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Packet id of the handshake frame.
pub const HANDSHAKE_PACKET_ID: u32 = 0x00;

/// Upper bound on a handshake-phase frame. Real handshake and status frames
/// are tens of bytes; anything larger is a hostile length declaration.
/// Tunneled traffic never passes through this path.
pub const MAX_FRAME_LEN: usize = 1024;

/// The intent a client declares in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    /// Server-list ping; answered locally, never wakes the backend.
    Status,
    /// Join attempt; triggers the debounced wake path.
    Login,
}

impl TryFrom<u32> for NextState {
    type Error = ProtocolViolation;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(NextState::Status),
            2 => Ok(NextState::Login),
            other => Err(ProtocolViolation::InvalidNextState(other)),
        }
    }
}

/// A classified handshake. The server address and port fields are skipped on
/// parse and not retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: u32,
    pub next_state: NextState,
}

/// Read one length-prefixed frame: a varint length, then exactly that many
/// bytes. A peer closing mid-frame is `ConnectionClosed`.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, GatewayError> {
    let len = read_varint(reader).await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolViolation::OversizedFrame(len).into());
    }
    let mut frame = vec![0u8; len];
    reader
        .read_exact(&mut frame)
        .await
        .map_err(GatewayError::from_read_error)?;
    Ok(frame)
}

/// Write one framed packet: `varint(len) || varint(packet_id) || payload`.
pub async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet_id: u32,
    payload: &[u8],
) -> Result<(), GatewayError> {
    let id = encode_varint(packet_id);
    let mut frame = encode_varint((id.len() + payload.len()) as u32);
    frame.extend_from_slice(&id);
    frame.extend_from_slice(payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Split a frame buffer into its packet id and payload.
pub fn split_packet(frame: &[u8]) -> Result<(u32, &[u8]), ProtocolViolation> {
    let (packet_id, idx) = decode_varint(frame, 0)?;
    Ok((packet_id, &frame[idx..]))
}

/// Read and classify the handshake of a freshly accepted connection.
///
/// Consumes exactly one frame. Any parse failure, a packet id other than 0,
/// or a next_state outside {1, 2} is an error; the caller must close the
/// connection without writing a byte.
pub async fn read_handshake<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Handshake, GatewayError> {
    let frame = read_frame(reader).await?;
    Ok(parse_handshake(&frame)?)
}

/// Parse a handshake frame buffer positionally: packet id, protocol version,
/// address length + skipped address bytes, 2 skipped port bytes, next_state.
pub fn parse_handshake(frame: &[u8]) -> Result<Handshake, ProtocolViolation> {
    let (packet_id, idx) = decode_varint(frame, 0)?;
    if packet_id != HANDSHAKE_PACKET_ID {
        return Err(ProtocolViolation::UnexpectedPacketId(packet_id));
    }

    let (protocol_version, idx) = decode_varint(frame, idx)?;

    // Skip the declared server address and the 2-byte port; neither is used.
    let (addr_len, idx) = decode_varint(frame, idx)?;
    let idx = idx
        .checked_add(addr_len as usize)
        .and_then(|i| i.checked_add(2))
        .filter(|&i| i <= frame.len())
        .ok_or(ProtocolViolation::TruncatedFrame)?;

    let (next_state, _) = decode_varint(frame, idx)?;

    Ok(Handshake {
        protocol_version,
        next_state: NextState::try_from(next_state)?,
    })
}
