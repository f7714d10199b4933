//! Status responder
//!
//! Answers the server-list ping exchange locally while the backend is down:
//! one Status Response with a fixed offline MOTD, then an optional Ping/Pong
//! echo. This path has no side effects beyond the connection itself and never
//! wakes anything.

use crate::config::StatusConfig;
use crate::error::{GatewayError, ProtocolViolation};
use crate::protocol::{read_frame, split_packet, write_packet};
use crate::varint::encode_varint;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Packet id of Status Request and Status Response.
pub const STATUS_PACKET_ID: u32 = 0x00;
/// Packet id of Ping and Pong.
pub const PING_PACKET_ID: u32 = 0x01;
/// A Ping carries an opaque 8-byte payload.
const PING_PAYLOAD_LEN: usize = 8;

/// JSON body of the Status Response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: StatusVersion,
    pub players: StatusPlayers,
    pub description: StatusDescription,
}

#[derive(Debug, Serialize)]
pub struct StatusVersion {
    pub name: String,
    pub protocol: u32,
}

#[derive(Debug, Serialize)]
pub struct StatusPlayers {
    pub max: u32,
    pub online: u32,
}

#[derive(Debug, Serialize)]
pub struct StatusDescription {
    pub text: String,
}

impl StatusResponse {
    /// Fixed response contents; only the protocol version is echoed from the
    /// client's handshake.
    pub fn offline(config: &StatusConfig, protocol_version: u32) -> Self {
        Self {
            version: StatusVersion {
                name: config.version_name.clone(),
                protocol: protocol_version,
            },
            players: StatusPlayers {
                max: config.max_players,
                online: 0,
            },
            description: StatusDescription {
                text: config.offline_motd.clone(),
            },
        }
    }
}

/// Run the status sub-exchange on a connection whose handshake declared
/// `next_state = status`.
///
/// Expects a Status Request frame, answers it, then echoes at most one Ping.
/// The caller closes the connection afterwards in every case.
pub async fn respond<S>(
    stream: &mut S,
    protocol_version: u32,
    config: &StatusConfig,
) -> Result<(), GatewayError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = read_frame(stream).await?;
    let (packet_id, _) = split_packet(&frame)?;
    if packet_id != STATUS_PACKET_ID {
        return Err(ProtocolViolation::UnexpectedPacketId(packet_id).into());
    }

    let response = StatusResponse::offline(config, protocol_version);
    let json = serde_json::to_vec(&response)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut payload = encode_varint(json.len() as u32);
    payload.extend_from_slice(&json);
    write_packet(stream, STATUS_PACKET_ID, &payload).await?;

    // Optional Ping. Most clients send one after the response; its absence,
    // or anything malformed in its place, is not an error.
    match read_frame(stream).await {
        Ok(frame) => match split_packet(&frame) {
            Ok((PING_PACKET_ID, payload)) if payload.len() == PING_PAYLOAD_LEN => {
                let _ = write_packet(stream, PING_PACKET_ID, payload).await;
            }
            _ => debug!("ignoring malformed frame after status response"),
        },
        Err(_) => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};

    async fn send_status_request<S: AsyncWrite + AsyncRead + Unpin>(client: &mut S) {
        write_packet(client, STATUS_PACKET_ID, &[]).await.unwrap();
    }

    async fn read_json_body<S: AsyncRead + Unpin>(client: &mut S) -> serde_json::Value {
        let frame = read_frame(client).await.unwrap();
        let (id, payload) = split_packet(&frame).unwrap();
        assert_eq!(id, STATUS_PACKET_ID);
        let (json_len, idx) = crate::varint::decode_varint(payload, 0).unwrap();
        let json = &payload[idx..idx + json_len as usize];
        serde_json::from_slice(json).unwrap()
    }

    #[tokio::test]
    async fn test_status_response_shape() {
        let (mut client, mut server) = duplex(1024);
        let config = StatusConfig::default();

        let handler = tokio::spawn(async move { respond(&mut server, 767, &config).await });

        send_status_request(&mut client).await;
        let body = read_json_body(&mut client).await;

        assert_eq!(body["version"]["protocol"], 767);
        assert_eq!(body["version"]["name"], "1.21.1");
        assert_eq!(body["players"]["online"], 0);
        assert_eq!(body["players"]["max"], 20);
        assert_eq!(
            body["description"]["text"],
            StatusConfig::default().offline_motd
        );

        drop(client);
        handler.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_ping_is_echoed_verbatim() {
        let (mut client, mut server) = duplex(1024);
        let config = StatusConfig::default();

        let handler = tokio::spawn(async move { respond(&mut server, 767, &config).await });

        send_status_request(&mut client).await;
        let _ = read_json_body(&mut client).await;

        let nonce = [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        write_packet(&mut client, PING_PACKET_ID, &nonce)
            .await
            .unwrap();

        let pong = read_frame(&mut client).await.unwrap();
        let (id, payload) = split_packet(&pong).unwrap();
        assert_eq!(id, PING_PACKET_ID);
        assert_eq!(payload, nonce);

        handler.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_missing_ping_is_not_an_error() {
        let (mut client, mut server) = duplex(1024);
        let config = StatusConfig::default();

        let handler = tokio::spawn(async move { respond(&mut server, 767, &config).await });

        send_status_request(&mut client).await;
        let _ = read_json_body(&mut client).await;
        drop(client); // hang up without pinging

        handler.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_ping_gets_no_pong() {
        let (mut client, mut server) = duplex(1024);
        let config = StatusConfig::default();

        let handler = tokio::spawn(async move { respond(&mut server, 767, &config).await });

        send_status_request(&mut client).await;
        let _ = read_json_body(&mut client).await;

        // Ping id with a 3-byte payload instead of 8.
        write_packet(&mut client, PING_PACKET_ID, &[1, 2, 3])
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        // The exchange still counts as a success and nothing more is written.
        handler.await.unwrap().unwrap();
        let mut remaining = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut client, &mut remaining)
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_request_id_writes_nothing() {
        let (mut client, mut server) = duplex(1024);
        let config = StatusConfig::default();

        let handler = tokio::spawn(async move { respond(&mut server, 767, &config).await });

        // Ping id where a Status Request belongs.
        write_packet(&mut client, PING_PACKET_ID, &[0u8; 8])
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        match handler.await.unwrap() {
            Err(GatewayError::Protocol(ProtocolViolation::UnexpectedPacketId(1))) => {}
            other => panic!("expected unexpected packet id, got {other:?}"),
        }

        let mut remaining = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut client, &mut remaining)
            .await
            .unwrap();
        assert!(remaining.is_empty(), "no bytes may be written on protocol error");
    }

    #[test]
    fn test_json_field_layout() {
        let response = StatusResponse::offline(&StatusConfig::default(), 767);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.starts_with(r#"{"version""#));
        assert!(json.contains(r#""protocol":767"#));
        assert!(json.contains(r#""online":0"#));
    }
}
