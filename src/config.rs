use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Global configuration for the gateway
///
/// Every field has a default, so an empty (or absent) file yields a working
/// configuration apart from the two collaborator URLs, which have no sane
/// default and are checked by `validate`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// The proxied backend port and its probe/connect timeouts
    #[serde(default)]
    pub backend: BackendConfig,

    /// Backend discovery (inventory) endpoint
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Wake trigger endpoint and cooldown
    #[serde(default)]
    pub wake: WakeConfig,

    /// Status response contents
    #[serde(default)]
    pub status: StatusConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Port to listen on (default: 25565)
    #[serde(default = "default_game_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Port the backend listens on (default: 25565)
    #[serde(default = "default_game_port")]
    pub port: u16,

    /// Timeout for the per-connection reachability probe in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Timeout for the tunnel's backend connect in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    /// Inventory endpoint queried for a running backend instance
    pub inventory_url: Option<String>,

    /// Tag key the inventory filters on
    #[serde(default = "default_tag_key")]
    pub tag_key: String,

    /// Tag value the inventory filters on
    #[serde(default = "default_tag_value")]
    pub tag_value: String,

    /// Timeout for inventory queries in seconds
    #[serde(default = "default_discovery_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WakeConfig {
    /// Endpoint invoked (fire-and-forget) to start the backend
    pub trigger_url: Option<String>,

    /// Minimum interval between successive wake invocations in seconds
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Timeout for the trigger call in seconds
    #[serde(default = "default_wake_timeout")]
    pub request_timeout_secs: u64,

    /// Disconnect message shown to a joining player while the backend starts
    #[serde(default = "default_starting_message")]
    pub starting_message: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    /// Version name advertised in the status response
    #[serde(default = "default_version_name")]
    pub version_name: String,

    /// Player cap advertised in the status response
    #[serde(default = "default_max_players")]
    pub max_players: u32,

    /// MOTD shown while the backend is offline; never changes at runtime
    #[serde(default = "default_offline_motd")]
    pub offline_motd: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_game_port() -> u16 {
    25565
}

fn default_probe_timeout() -> u64 {
    2
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_tag_key() -> String {
    "MinecraftServer".to_string()
}

fn default_tag_value() -> String {
    "True".to_string()
}

fn default_discovery_timeout() -> u64 {
    10
}

fn default_cooldown() -> u64 {
    180
}

fn default_wake_timeout() -> u64 {
    30
}

fn default_starting_message() -> String {
    "Server is spinning up. Please try again in ~30 seconds.".to_string()
}

fn default_version_name() -> String {
    "1.21.1".to_string()
}

fn default_max_players() -> u32 {
    20
}

fn default_offline_motd() -> String {
    "§eServer is OFFLINE. It spins up only when you actually join. \
     Estimated Spinup Time: 1 minute. Please do not idle on the server ping menu."
        .to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_game_port(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            port: default_game_port(),
            probe_timeout_secs: default_probe_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            inventory_url: None,
            tag_key: default_tag_key(),
            tag_value: default_tag_value(),
            request_timeout_secs: default_discovery_timeout(),
        }
    }
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            trigger_url: None,
            cooldown_secs: default_cooldown(),
            request_timeout_secs: default_wake_timeout(),
            starting_message: default_starting_message(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            version_name: default_version_name(),
            max_players: default_max_players(),
            offline_motd: default_offline_motd(),
        }
    }
}

impl BackendConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl WakeConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        if self.discovery.inventory_url.is_none() {
            errors.push("[discovery] requires 'inventory_url'".to_string());
        }
        if self.wake.trigger_url.is_none() {
            errors.push("[wake] requires 'trigger_url'".to_string());
        }
        if self.server.port == 0 {
            errors.push("[server] 'port' must be greater than 0".to_string());
        }
        if self.backend.port == 0 {
            errors.push("[backend] 'port' must be greater than 0".to_string());
        }
        if self.wake.cooldown_secs == 0 {
            errors.push("[wake] 'cooldown_secs' must be greater than 0".to_string());
        }

        if !errors.is_empty() {
            anyhow::bail!("Configuration errors:\n  - {}", errors.join("\n  - "));
        }

        Ok(())
    }
}
