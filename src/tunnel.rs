//! Raw byte tunnel
//!
//! When the backend is already up the gateway gets out of the way: both
//! directions are relayed untouched, including the client's handshake bytes,
//! which are never parsed on this path. Read and write errors are routine
//! (one of the peers hung up) and are never reported upward.

use crate::error::GatewayError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

/// Fixed relay buffer, per direction.
const COPY_BUFFER_SIZE: usize = 4096;

/// Connect to the backend with a bounded timeout. On failure the caller
/// closes the client; no copy loop is started.
pub async fn connect(
    address: &str,
    port: u16,
    timeout: Duration,
) -> Result<TcpStream, GatewayError> {
    match tokio::time::timeout(timeout, TcpStream::connect((address, port))).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(GatewayError::BackendUnavailable {
            address: address.to_string(),
            port,
            reason: e.to_string(),
        }),
        Err(_) => Err(GatewayError::BackendUnavailable {
            address: address.to_string(),
            port,
            reason: format!("connect timed out after {}s", timeout.as_secs()),
        }),
    }
}

/// Relay bytes between an established client and backend connection until
/// either side closes or errors.
///
/// Two independent copy tasks share the sockets' split halves. Whichever
/// direction terminates first aborts the other, dropping its halves, so both
/// sockets close within bounded time.
pub async fn run(client: TcpStream, backend: TcpStream) {
    let (client_read, client_write) = client.into_split();
    let (backend_read, backend_write) = backend.into_split();

    let mut upstream = tokio::spawn(copy_half(client_read, backend_write, "client->backend"));
    let mut downstream = tokio::spawn(copy_half(backend_read, client_write, "backend->client"));

    tokio::select! {
        _ = &mut upstream => downstream.abort(),
        _ = &mut downstream => upstream.abort(),
    }
}

async fn copy_half(mut reader: OwnedReadHalf, mut writer: OwnedWriteHalf, direction: &'static str) {
    let mut buf = [0u8; COPY_BUFFER_SIZE];
    let mut total: u64 = 0;

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                total += n as u64;
                if writer.write_all(&buf[..n]).await.is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }

    let _ = writer.shutdown().await;
    debug!(direction, bytes = total, "tunnel direction closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Echo server that handles a single connection.
    async fn spawn_echo_backend() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if stream.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        addr
    }

    /// A connected (client, gateway-side) socket pair over loopback.
    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();
        (client, server_side)
    }

    #[tokio::test]
    async fn test_bytes_relayed_both_ways_in_order() {
        let backend_addr = spawn_echo_backend().await;
        let (mut client, gateway_side) = socket_pair().await;
        let backend = TcpStream::connect(backend_addr).await.unwrap();

        tokio::spawn(run(gateway_side, backend));

        for message in [&b"hello"[..], &b"world, again"[..]] {
            client.write_all(message).await.unwrap();
            let mut echoed = vec![0u8; message.len()];
            client.read_exact(&mut echoed).await.unwrap();
            assert_eq!(echoed, message);
        }
    }

    #[tokio::test]
    async fn test_client_close_takes_down_backend_side() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = listener.local_addr().unwrap();

        let backend_task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // Block until the tunnel collapses; EOF or error both qualify.
            let mut buf = [0u8; 16];
            matches!(stream.read(&mut buf).await, Ok(0) | Err(_))
        });

        let (client, gateway_side) = socket_pair().await;
        let backend = TcpStream::connect(backend_addr).await.unwrap();
        tokio::spawn(run(gateway_side, backend));

        drop(client);

        let saw_close = tokio::time::timeout(Duration::from_secs(5), backend_task)
            .await
            .expect("backend side must close within bounded time")
            .unwrap();
        assert!(saw_close);
    }

    #[tokio::test]
    async fn test_backend_close_takes_down_client_side() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let (mut client, gateway_side) = socket_pair().await;
        let backend = TcpStream::connect(backend_addr).await.unwrap();
        tokio::spawn(run(gateway_side, backend));

        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf))
            .await
            .expect("client side must close within bounded time");
        assert!(matches!(read, Ok(0) | Err(_)));
    }

    #[tokio::test]
    async fn test_connect_failure_is_backend_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        match connect("127.0.0.1", port, Duration::from_secs(2)).await {
            Err(GatewayError::BackendUnavailable { port: p, .. }) => assert_eq!(p, port),
            other => panic!("expected backend unavailable, got {other:?}"),
        }
    }
}
