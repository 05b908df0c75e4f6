//! Agent state
//!
//! Application state shared by every route.

use std::sync::Arc;

use presence_cache::RedisPool;
use presence_common::AppConfig;
use presence_service::{CoordinatorHandle, LocalIdentityProvider};

/// Agent application state
#[derive(Clone)]
pub struct AgentState {
    /// Running lifecycle coordinator
    presence: CoordinatorHandle,
    /// Identity source the coordinator watches
    identities: LocalIdentityProvider,
    /// Redis pool when the Redis store is in use
    redis: Option<RedisPool>,
    config: Arc<AppConfig>,
}

impl AgentState {
    pub fn new(
        presence: CoordinatorHandle,
        identities: LocalIdentityProvider,
        redis: Option<RedisPool>,
        config: AppConfig,
    ) -> Self {
        Self {
            presence,
            identities,
            redis,
            config: Arc::new(config),
        }
    }

    pub fn presence(&self) -> &CoordinatorHandle {
        &self.presence
    }

    pub fn identities(&self) -> &LocalIdentityProvider {
        &self.identities
    }

    pub fn redis(&self) -> Option<&RedisPool> {
        self.redis.as_ref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentState")
            .field("phase", &self.presence.phase())
            .field("redis", &self.redis)
            .field("config", &"AppConfig")
            .finish()
    }
}
