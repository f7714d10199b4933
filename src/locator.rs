//! Backend discovery
//!
//! The gateway never manages the backend's lifecycle; it only asks an
//! external inventory whether an instance is running, then verifies
//! reachability with a bounded TCP probe. Both answers are computed fresh for
//! every connection, because the backend can come or go between connections.

use crate::config::DiscoveryConfig;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Backend discovery interface.
#[async_trait]
pub trait BackendLocator: Send + Sync {
    /// Address of a running backend instance, if the inventory knows one.
    async fn find_running_backend(&self) -> Option<String>;

    /// Bounded-timeout reachability probe. Never errors: any failure,
    /// including the timeout, reads as "closed".
    async fn is_port_open(&self, address: &str, port: u16, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(_stream)) => {
                debug!(address, port, "reachability probe passed");
                true
            }
            Ok(Err(e)) => {
                debug!(address, port, error = %e, "reachability probe failed");
                false
            }
            Err(_) => {
                debug!(address, port, "reachability probe timed out");
                false
            }
        }
    }
}

/// What the inventory endpoint answers for a filtered instance query.
#[derive(Debug, Deserialize)]
struct InventoryResponse {
    /// Address of the first matching running instance, absent when none is.
    address: Option<String>,
}

/// Locator that queries an HTTP inventory endpoint with a fixed tag filter
/// and a running-state filter.
pub struct HttpInventoryLocator {
    client: reqwest::Client,
    url: String,
    tag_key: String,
    tag_value: String,
}

impl HttpInventoryLocator {
    pub fn from_config(config: &DiscoveryConfig) -> anyhow::Result<Self> {
        let url = config
            .inventory_url
            .clone()
            .context("[discovery] inventory_url is not configured")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self {
            client,
            url,
            tag_key: config.tag_key.clone(),
            tag_value: config.tag_value.clone(),
        })
    }
}

#[async_trait]
impl BackendLocator for HttpInventoryLocator {
    async fn find_running_backend(&self) -> Option<String> {
        let request = self.client.get(&self.url).query(&[
            ("tag_key", self.tag_key.as_str()),
            ("tag_value", self.tag_value.as_str()),
            ("state", "running"),
        ]);

        let response = match request.send().await.and_then(|r| r.error_for_status()) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "inventory query failed");
                return None;
            }
        };

        match response.json::<InventoryResponse>().await {
            Ok(inventory) => inventory.address.filter(|a| !a.is_empty()),
            Err(e) => {
                warn!(error = %e, "inventory response was not decodable");
                None
            }
        }
    }
}
