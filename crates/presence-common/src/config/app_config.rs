//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub presence: PresenceSettings,
    pub store: StoreConfig,
    pub redis: Option<RedisConfig>,
    pub agent: AgentConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Presence tracking settings
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceSettings {
    /// Key range holding presence records
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Display name used when the identity has none
    #[serde(default = "default_display_name")]
    pub default_display_name: String,
    /// Capacity of the online-set broadcast channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            default_display_name: default_display_name(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Which presence store back-end to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store (single process, tests and demos)
    #[default]
    Memory,
    /// Shared Redis store
    Redis,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(ConfigError::InvalidValue("PRESENCE_STORE", other.to_string())),
        }
    }
}

/// Presence store settings
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// How long a disconnect guarantee survives without a keepalive
    #[serde(default = "default_guarantee_lease_ms")]
    pub guarantee_lease_ms: u64,
    /// How often a connection refreshes its guarantee leases
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    /// How often the store-side reaper looks for expired leases
    #[serde(default = "default_reaper_interval_ms")]
    pub reaper_interval_ms: u64,
}

impl StoreConfig {
    #[must_use]
    pub fn guarantee_lease(&self) -> Duration {
        Duration::from_millis(self.guarantee_lease_ms)
    }

    #[must_use]
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    #[must_use]
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            guarantee_lease_ms: default_guarantee_lease_ms(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
            reaper_interval_ms: default_reaper_interval_ms(),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Presence agent settings
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_agent_port")]
    pub port: u16,
    /// Identity the agent signs in with at startup
    pub client_id: Option<String>,
    pub display_name: Option<String>,
}

impl AgentConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_agent_port(),
            client_id: None,
            display_name: None,
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "presence".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_key_prefix() -> String {
    "users".to_string()
}

fn default_display_name() -> String {
    presence_core::DEFAULT_DISPLAY_NAME.to_string()
}

fn default_event_buffer() -> usize {
    256
}

fn default_guarantee_lease_ms() -> u64 {
    15_000
}

fn default_keepalive_interval_ms() -> u64 {
    5_000
}

fn default_reaper_interval_ms() -> u64 {
    2_000
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_agent_port() -> u16 {
    8090
}

/// Parse an optional numeric variable, falling back to `default` when unset
fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: fn() -> T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(var, raw)),
        None => Ok(default()),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = StoreConfig {
            backend: lookup("PRESENCE_STORE")
                .map(|s| s.parse::<StoreBackend>())
                .transpose()?
                .unwrap_or_default(),
            guarantee_lease_ms: parse_or(
                &lookup,
                "PRESENCE_GUARANTEE_LEASE_MS",
                default_guarantee_lease_ms,
            )?,
            keepalive_interval_ms: parse_or(
                &lookup,
                "PRESENCE_KEEPALIVE_INTERVAL_MS",
                default_keepalive_interval_ms,
            )?,
            reaper_interval_ms: parse_or(
                &lookup,
                "PRESENCE_REAPER_INTERVAL_MS",
                default_reaper_interval_ms,
            )?,
        };

        if store.keepalive_interval_ms == 0 || store.keepalive_interval_ms >= store.guarantee_lease_ms {
            return Err(ConfigError::InvalidValue(
                "PRESENCE_KEEPALIVE_INTERVAL_MS",
                format!(
                    "{} (must be non-zero and below the {} ms lease)",
                    store.keepalive_interval_ms, store.guarantee_lease_ms
                ),
            ));
        }

        let redis = match lookup("REDIS_URL") {
            Some(url) => Some(RedisConfig {
                url,
                max_connections: parse_or(
                    &lookup,
                    "REDIS_MAX_CONNECTIONS",
                    default_redis_max_connections,
                )?,
            }),
            None if store.backend == StoreBackend::Redis => {
                return Err(ConfigError::MissingVar("REDIS_URL"));
            }
            None => None,
        };

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            presence: PresenceSettings {
                key_prefix: lookup("PRESENCE_KEY_PREFIX").unwrap_or_else(default_key_prefix),
                default_display_name: lookup("PRESENCE_DEFAULT_DISPLAY_NAME")
                    .unwrap_or_else(default_display_name),
                event_buffer: parse_or(&lookup, "PRESENCE_EVENT_BUFFER", default_event_buffer)?,
            },
            store,
            redis,
            agent: AgentConfig {
                host: lookup("AGENT_HOST").unwrap_or_else(default_host),
                port: parse_or(&lookup, "AGENT_PORT", default_agent_port)?,
                client_id: lookup("AGENT_CLIENT_ID"),
                display_name: lookup("AGENT_DISPLAY_NAME"),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
