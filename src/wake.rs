//! Wake coordination
//!
//! Login attempts while the backend is down funnel through one
//! `WakeCoordinator`, which debounces the external wake trigger: at most one
//! successful invocation per cooldown window, no matter how many players
//! hammer the join button. The trigger itself is a narrow consumed interface;
//! starting the backend, deduplicating concurrent starts, and shutting it
//! down again are the collaborator's job.

use crate::config::WakeConfig;
use crate::error::GatewayError;
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// External wake trigger interface.
#[async_trait]
pub trait WakeTrigger: Send + Sync {
    /// Ask the collaborator to start the backend. Fire-and-forget: safe to
    /// call while a start is already in flight.
    async fn trigger_wake(&self) -> anyhow::Result<()>;
}

/// Wake trigger that POSTs to the start function's invocation endpoint.
pub struct HttpWakeTrigger {
    client: reqwest::Client,
    url: String,
}

impl HttpWakeTrigger {
    pub fn from_config(config: &WakeConfig) -> anyhow::Result<Self> {
        let url = config
            .trigger_url
            .clone()
            .context("[wake] trigger_url is not configured")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self { client, url })
    }
}

#[async_trait]
impl WakeTrigger for HttpWakeTrigger {
    async fn trigger_wake(&self) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .send()
            .await
            .context("wake trigger request failed")?
            .error_for_status()
            .context("wake trigger returned an error status")?;
        Ok(())
    }
}

struct WakeState {
    last_invoked: Option<Instant>,
}

/// Debounces the wake trigger across all connections.
///
/// The lock is held for the full decision *and* the trigger call, so
/// concurrent login attempts serialize here. The trigger is expected to
/// return quickly.
pub struct WakeCoordinator {
    trigger: Arc<dyn WakeTrigger>,
    cooldown: Duration,
    state: Mutex<WakeState>,
}

impl WakeCoordinator {
    pub fn new(trigger: Arc<dyn WakeTrigger>, cooldown: Duration) -> Self {
        Self {
            trigger,
            cooldown,
            state: Mutex::new(WakeState { last_invoked: None }),
        }
    }

    /// Invoke the wake trigger unless one succeeded within the cooldown
    /// window. Returns whether a wake was actually issued.
    ///
    /// A failed trigger call does not advance the cooldown window, so the
    /// next login attempt tries again. The caller is expected to log and
    /// swallow the error; it must never block the disconnect message.
    pub async fn maybe_wake(&self) -> Result<bool, GatewayError> {
        let mut state = self.state.lock().await;

        let due = state
            .last_invoked
            .map_or(true, |at| at.elapsed() > self.cooldown);
        if !due {
            debug!("wake skipped, still in cooldown window");
            return Ok(false);
        }

        info!("invoking wake trigger due to login attempt");
        match self.trigger.trigger_wake().await {
            Ok(()) => {
                state.last_invoked = Some(Instant::now());
                Ok(true)
            }
            Err(e) => Err(GatewayError::WakeTrigger(e.to_string())),
        }
    }
}
