//! Presence agent entry point
//!
//! Run with:
//! ```bash
//! AGENT_CLIENT_ID=alice cargo run -p presence-agent
//! ```
//!
//! Configuration is loaded from environment variables.

use presence_common::{try_init_tracing_with_config, AppConfig, AppError, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let env = AppConfig::from_env().map(|c| c.app.env).unwrap_or_default();
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, code = e.error_code(), "Presence agent failed");
        std::process::exit(e.exit_code());
    }
}

async fn run() -> Result<(), AppError> {
    info!("Starting presence agent...");

    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.app.env,
        store = ?config.store.backend,
        address = %config.agent.address(),
        "Configuration loaded"
    );

    presence_agent::run(config).await
}
