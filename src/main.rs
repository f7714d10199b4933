use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use wakegate::config::Config;
use wakegate::locator::HttpInventoryLocator;
use wakegate::proxy::GatewayServer;
use wakegate::wake::{HttpWakeTrigger, WakeCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wakegate=debug".parse().expect("valid log directive")),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path.display(), error = %e, "Failed to load configuration");
        e
    })?;

    info!(path = %config_path.display(), "Configuration loaded");

    print_startup_banner(&config);

    let bind_addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .map_err(|e| {
            error!(bind = %config.server.bind, port = config.server.port, error = %e, "Invalid bind address");
            anyhow::anyhow!("Invalid bind address: {}", e)
        })?;

    // Wire up the two consumed collaborators
    let locator = Arc::new(HttpInventoryLocator::from_config(&config.discovery)?);
    let trigger = Arc::new(HttpWakeTrigger::from_config(&config.wake)?);
    let wake = Arc::new(WakeCoordinator::new(trigger, config.wake.cooldown()));

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = GatewayServer::new(bind_addr, Arc::new(config), locator, wake, shutdown_rx);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!(error = %e, "Gateway server error");
        }
    });

    // Wait for shutdown signal (Ctrl+C or SIGTERM)
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT (Ctrl+C), shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down...");
    }

    // Signal shutdown; in-flight connection handlers are not drained.
    let _ = shutdown_tx.send(true);

    let _ = tokio::time::timeout(Duration::from_secs(5), server_handle).await;

    info!("Shutdown complete");
    Ok(())
}

fn print_startup_banner(config: &Config) {
    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "Starting gateway"
    );
    info!(
        bind = %config.server.bind,
        port = config.server.port,
        backend_port = config.backend.port,
        "Listener configuration"
    );
    info!(
        inventory_url = config.discovery.inventory_url.as_deref().unwrap_or("-"),
        tag = %format!("{}={}", config.discovery.tag_key, config.discovery.tag_value),
        probe_timeout_secs = config.backend.probe_timeout_secs,
        "Backend discovery settings"
    );
    info!(
        trigger_url = config.wake.trigger_url.as_deref().unwrap_or("-"),
        cooldown_secs = config.wake.cooldown_secs,
        "Wake settings"
    );
    info!(
        version_name = %config.status.version_name,
        max_players = config.status.max_players,
        "Status response settings"
    );
}
