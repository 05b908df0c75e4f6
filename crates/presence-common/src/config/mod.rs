//! Configuration structs

mod app_config;

pub use app_config::{
    AgentConfig, AppConfig, AppSettings, ConfigError, Environment, PresenceSettings,
    RedisConfig, StoreBackend, StoreConfig,
};
