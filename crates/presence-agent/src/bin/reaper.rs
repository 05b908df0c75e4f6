//! Guarantee reaper entry point
//!
//! Applies disconnect guarantees of presence clients whose Redis lease
//! expired. Run one next to the Redis deployment:
//! ```bash
//! REDIS_URL=redis://127.0.0.1:6379 cargo run -p presence-agent --bin presence-reaper
//! ```

use presence_agent::shutdown_signal;
use presence_cache::{GuaranteeReaper, RedisPool};
use presence_common::{
    try_init_tracing_with_config, AppConfig, AppError, ConfigError, TracingConfig,
};
use presence_core::KeyPrefix;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let env = AppConfig::from_env().map(|c| c.app.env).unwrap_or_default();
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, code = e.error_code(), "Guarantee reaper failed");
        std::process::exit(e.exit_code());
    }
}

async fn run() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let redis = config
        .redis
        .as_ref()
        .ok_or(ConfigError::MissingVar("REDIS_URL"))?;

    let pool = RedisPool::from_config(redis).map_err(AppError::cache)?;
    pool.health_check().await.map_err(AppError::cache)?;
    info!("Redis connection established");

    let reaper = GuaranteeReaper::new(
        pool,
        KeyPrefix::new(config.presence.key_prefix.clone()),
        config.store.reaper_interval(),
    );

    reaper.run(shutdown_signal()).await;

    Ok(())
}
