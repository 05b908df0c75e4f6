//! Redis connection pool using deadpool-redis.
//!
//! Commands used by the presence store and the guarantee reaper live here so
//! both share one error type and one serialization path.

use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use std::time::Duration;

/// Redis pool configuration
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL (e.g., `redis://localhost:6379`)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: usize,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 16,
        }
    }
}

impl From<&presence_common::RedisConfig> for RedisPoolConfig {
    fn from(config: &presence_common::RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections as usize,
        }
    }
}

/// Error type for Redis pool operations
#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] deadpool_redis::PoolError),

    #[error("Redis command error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RedisPoolError {
    /// Whether the failure came from losing the server rather than from a bad command
    pub fn is_connection_loss(&self) -> bool {
        match self {
            Self::GetConnection(_) => true,
            Self::Redis(e) => e.is_connection_dropped() || e.is_io_error() || e.is_timeout(),
            Self::CreatePool(_) | Self::Serialization(_) => false,
        }
    }
}

/// Result type for Redis pool operations
pub type RedisResult<T> = Result<T, RedisPoolError>;

/// Managed Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
    url: String,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl RedisPool {
    /// Create a new Redis pool with the given configuration
    pub fn new(config: RedisPoolConfig) -> RedisResult<Self> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?;

        // Redact credentials from URL for logging
        let safe_url = config.url.split('@').next_back().unwrap_or(&config.url);
        tracing::info!(
            url = %safe_url,
            max_connections = config.max_connections,
            "Redis pool created"
        );

        Ok(Self {
            pool,
            url: config.url,
        })
    }

    /// Create a new Redis pool from presence-common config
    pub fn from_config(config: &presence_common::RedisConfig) -> RedisResult<Self> {
        Self::new(RedisPoolConfig::from(config))
    }

    /// Open a dedicated client for pub/sub, which cannot share pooled connections
    pub fn pubsub_client(&self) -> RedisResult<redis::Client> {
        Ok(redis::Client::open(self.url.as_str())?)
    }

    /// Get a connection from the pool
    pub async fn get(&self) -> RedisResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(RedisPoolError::GetConnection)
    }

    /// Check if the pool is healthy by pinging Redis
    pub async fn health_check(&self) -> RedisResult<()> {
        let mut conn = self.get().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Store a record as JSON, without expiry
    pub async fn put_json<V: serde::Serialize>(&self, key: &str, value: &V) -> RedisResult<()> {
        let encoded = serde_json::to_string(value)?;
        let mut conn = self.get().await?;
        conn.set::<_, _, ()>(key, encoded).await?;
        Ok(())
    }

    pub async fn get_json<V: serde::de::DeserializeOwned>(&self, key: &str) -> RedisResult<Option<V>> {
        let mut conn = self.get().await?;
        let raw: Option<String> = conn.get(key).await?;
        decode(raw)
    }

    pub async fn get_raw(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.get().await?;
        let raw: Option<String> = conn.get(key).await?;
        Ok(raw)
    }

    /// Fetch raw values for many keys in one round trip
    pub async fn get_raw_many(&self, keys: &[String]) -> RedisResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.get().await?;
        let values: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    /// Read and delete in one step (`GETDEL`)
    ///
    /// At most one caller ever sees a given value.
    pub async fn take_json<V: serde::de::DeserializeOwned>(&self, key: &str) -> RedisResult<Option<V>> {
        let mut conn = self.get().await?;
        let raw: Option<String> = redis::cmd("GETDEL").arg(key).query_async(&mut conn).await?;
        decode(raw)
    }

    /// Delete a key
    pub async fn delete(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.get().await?;
        let deleted: i32 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    /// Check if a key exists
    pub async fn exists(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.get().await?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    /// Set a key with a millisecond expiry
    pub async fn set_raw_px(&self, key: &str, value: &str, ttl: Duration) -> RedisResult<()> {
        let mut conn = self.get().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(duration_millis(ttl))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Refresh a key's expiry; `false` when the key no longer exists
    pub async fn pexpire(&self, key: &str, ttl: Duration) -> RedisResult<bool> {
        let mut conn = self.get().await?;
        let refreshed: bool = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(duration_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(refreshed)
    }

    /// Publish a message, returning the number of receivers
    pub async fn publish(&self, channel: &str, message: &str) -> RedisResult<i64> {
        let mut conn = self.get().await?;
        let receivers: i64 = conn.publish(channel, message).await?;
        Ok(receivers)
    }

    /// Run a Lua script atomically on the server
    pub async fn run_script<T: redis::FromRedisValue>(
        &self,
        script: &redis::Script,
        keys: &[&str],
        args: &[&str],
    ) -> RedisResult<T> {
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(*arg);
        }
        let mut conn = self.get().await?;
        let result: T = invocation.invoke_async(&mut conn).await?;
        Ok(result)
    }

    /// Every key matching `pattern`, sorted and without duplicates
    pub async fn scan_keys(&self, pattern: &str, count: usize) -> RedisResult<Vec<String>> {
        let mut conn = self.get().await?;
        let mut found = std::collections::BTreeSet::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(count)
                .query_async(&mut conn)
                .await?;
            found.extend(batch);
            if next == 0 {
                return Ok(found.into_iter().collect());
            }
            cursor = next;
        }
    }
}

fn decode<V: serde::de::DeserializeOwned>(raw: Option<String>) -> RedisResult<Option<V>> {
    raw.map(|v| serde_json::from_str(&v))
        .transpose()
        .map_err(RedisPoolError::from)
}

fn duration_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RedisPoolConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.max_connections, 16);
    }

    #[test]
    fn test_config_from_redis_config() {
        let redis_config = presence_common::RedisConfig {
            url: "redis://localhost:6380".to_string(),
            max_connections: 32,
        };
        let pool_config = RedisPoolConfig::from(&redis_config);
        assert_eq!(pool_config.url, "redis://localhost:6380");
        assert_eq!(pool_config.max_connections, 32);
    }

    #[test]
    fn test_duration_millis_never_zero() {
        assert_eq!(duration_millis(Duration::ZERO), 1);
        assert_eq!(duration_millis(Duration::from_secs(2)), 2000);
    }

    #[tokio::test]
    async fn test_pool_creation_is_lazy() {
        // No connection is attempted until the first command
        let pool = RedisPool::new(RedisPoolConfig {
            url: "redis://127.0.0.1:1".to_string(),
            max_connections: 2,
        });
        assert!(pool.is_ok());
    }
}
