//! The gateway listener and per-connection dispatch
//!
//! One task per accepted connection. Each connection gets a fresh backend
//! check: if the backend is reachable the raw bytes are tunneled untouched;
//! otherwise the handshake is classified and answered locally (status) or
//! turned into a debounced wake plus a disconnect message (login).

use crate::config::Config;
use crate::error::GatewayError;
use crate::locator::BackendLocator;
use crate::protocol::{self, NextState};
use crate::status;
use crate::tunnel;
use crate::varint::encode_varint;
use crate::wake::WakeCoordinator;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Packet id of the Login Disconnect frame.
const LOGIN_DISCONNECT_PACKET_ID: u32 = 0x00;

/// JSON chat component carried by the Login Disconnect frame.
#[derive(Debug, Serialize)]
struct ChatComponent<'a> {
    text: &'a str,
}

/// The gateway server
pub struct GatewayServer {
    bind_addr: SocketAddr,
    config: Arc<Config>,
    locator: Arc<dyn BackendLocator>,
    wake: Arc<WakeCoordinator>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    pub fn new(
        bind_addr: SocketAddr,
        config: Arc<Config>,
        locator: Arc<dyn BackendLocator>,
        wake: Arc<WakeCoordinator>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bind_addr,
            config,
            locator,
            wake,
            shutdown_rx,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "Gateway listening");

        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let config = Arc::clone(&self.config);
                            let locator = Arc::clone(&self.locator);
                            let wake = Arc::clone(&self.wake);

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, addr, config, locator, wake).await {
                                    debug!(addr = %addr, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Gateway shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    config: Arc<Config>,
    locator: Arc<dyn BackendLocator>,
    wake: Arc<WakeCoordinator>,
) -> Result<(), GatewayError> {
    debug!(addr = %addr, "client connected");

    // Fresh check on every connection; the backend can come or go between
    // connections, so nothing here is cached.
    if let Some(address) = locator.find_running_backend().await {
        let reachable = locator
            .is_port_open(&address, config.backend.port, config.backend.probe_timeout())
            .await;
        if reachable {
            let backend = tunnel::connect(
                &address,
                config.backend.port,
                config.backend.connect_timeout(),
            )
            .await?;
            info!(addr = %addr, backend = %address, "forwarding to running backend");
            tunnel::run(stream, backend).await;
            return Ok(());
        }
    }

    // Backend offline: this is the only path that reads the handshake.
    let handshake = protocol::read_handshake(&mut stream).await?;

    match handshake.next_state {
        NextState::Status => {
            debug!(addr = %addr, protocol = handshake.protocol_version, "status ping, answering locally");
            status::respond(&mut stream, handshake.protocol_version, &config.status).await
        }
        NextState::Login => {
            // A failed trigger is invisible to the client; the disconnect
            // message goes out either way.
            let woke = match wake.maybe_wake().await {
                Ok(woke) => woke,
                Err(e) => {
                    error!(addr = %addr, error = %e, "wake failed, disconnecting client anyway");
                    false
                }
            };
            info!(addr = %addr, woke, "login attempt while backend down");
            send_login_disconnect(&mut stream, &config.wake.starting_message).await
        }
    }
}

/// Send the Login Disconnect frame telling the player the backend is on its
/// way up. Sent whether or not this particular connection issued the wake.
async fn send_login_disconnect<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &str,
) -> Result<(), GatewayError> {
    let json = serde_json::to_vec(&ChatComponent { text: message })
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut payload = encode_varint(json.len() as u32);
    payload.extend_from_slice(&json);
    protocol::write_packet(writer, LOGIN_DISCONNECT_PACKET_ID, &payload).await
}
