use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "parlor.toml",
    "config/parlor.toml",
    "crates/config/parlor.toml",
    "../parlor.toml",
    "../config/parlor.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub realtime: RealtimeConfig,
    pub client: ClientConfig,
    /// Rooms to provision at startup when running without the community service.
    #[serde(default)]
    pub rooms: Vec<RoomSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://parlor.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Server-side knobs for the realtime channel and the history endpoint.
///
/// ```
/// use parlor_config::RealtimeConfig;
///
/// let realtime = RealtimeConfig::default();
/// assert_eq!(realtime.broadcast_capacity, 100);
/// assert_eq!(realtime.history_limit, 200);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "RealtimeConfig::default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    #[serde(default = "RealtimeConfig::default_history_limit")]
    pub history_limit: i64,
    #[serde(default = "RealtimeConfig::default_max_message_length")]
    pub max_message_length: usize,
}

impl RealtimeConfig {
    const fn default_broadcast_capacity() -> usize {
        100
    }

    const fn default_history_limit() -> i64 {
        200
    }

    const fn default_max_message_length() -> usize {
        4000
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: Self::default_broadcast_capacity(),
            history_limit: Self::default_history_limit(),
            max_message_length: Self::default_max_message_length(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "ClientConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    const fn default_outbound_buffer() -> usize {
        64
    }

    /// WebSocket endpoint derived from the HTTP base url.
    ///
    /// ```
    /// use parlor_config::ClientConfig;
    ///
    /// let mut client = ClientConfig::default();
    /// client.base_url = "https://chat.example.com/".to_string();
    /// assert_eq!(client.websocket_url(), "wss://chat.example.com/ws");
    /// ```
    pub fn websocket_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{base}/ws")
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7070".to_string(),
            outbound_buffer: Self::default_outbound_buffer(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Backoff policy used by the client when the realtime connection drops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "ReconnectConfig::default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "ReconnectConfig::default_max_delay")]
    pub max_delay_ms: u64,
    /// `None` retries forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl ReconnectConfig {
    const fn default_initial_delay() -> u64 {
        250
    }

    const fn default_max_delay() -> u64 {
        10_000
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: Self::default_initial_delay(),
            max_delay_ms: Self::default_max_delay(),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSeed {
    pub id: String,
    pub name: String,
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use parlor_config::load;
///
/// std::env::remove_var("PARLOR_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default(
            "realtime.broadcast_capacity",
            i64::try_from(defaults.realtime.broadcast_capacity).unwrap_or(i64::MAX),
        )?
        .set_default("realtime.history_limit", defaults.realtime.history_limit)?
        .set_default(
            "realtime.max_message_length",
            i64::try_from(defaults.realtime.max_message_length).unwrap_or(i64::MAX),
        )?
        .set_default("client.base_url", defaults.client.base_url.clone())?;

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("PARLOR_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via PARLOR_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(config::Environment::with_prefix("PARLOR").separator("__"));

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.realtime.broadcast_capacity == 0 {
        config.realtime.broadcast_capacity = RealtimeConfig::default_broadcast_capacity();
    }
    if config.realtime.history_limit <= 0 {
        warn!(
            history_limit = config.realtime.history_limit,
            "history_limit must be positive, using the default"
        );
        config.realtime.history_limit = RealtimeConfig::default_history_limit();
    }
    if config.client.reconnect.max_delay_ms < config.client.reconnect.initial_delay_ms {
        config.client.reconnect.max_delay_ms = config.client.reconnect.initial_delay_ms;
    }

    debug!(?config, "loaded configuration");
    Ok(config)
}
