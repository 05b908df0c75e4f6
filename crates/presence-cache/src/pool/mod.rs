//! Pooled Redis connections and the commands the presence store issues

mod redis_pool;

pub use redis_pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};
