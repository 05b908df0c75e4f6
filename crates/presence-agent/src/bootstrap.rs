//! Agent wiring: store selection, coordinator start-up, and the serve loop

use std::net::SocketAddr;
use std::sync::Arc;

use presence_cache::{MemoryPresenceStore, RedisPool, RedisPresenceStore, RedisStoreConfig};
use presence_common::{AppConfig, AppError, AppResult, ConfigError, StoreBackend};
use presence_core::{ClientId, Identity, PresenceStore};
use presence_service::{CoordinatorConfig, LifecycleCoordinator, LocalIdentityProvider};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::server::{create_app, AgentState};

/// Connect the configured store and spawn the coordinator
pub async fn create_agent_state(
    config: AppConfig,
    identities: LocalIdentityProvider,
) -> AppResult<AgentState> {
    let (store, redis): (Arc<dyn PresenceStore>, Option<RedisPool>) = match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-process presence store");
            (Arc::new(MemoryPresenceStore::new().connect()), None)
        }
        StoreBackend::Redis => {
            let redis_config = config
                .redis
                .as_ref()
                .ok_or(ConfigError::MissingVar("REDIS_URL"))?;

            info!("Connecting to Redis...");
            let pool = RedisPool::from_config(redis_config).map_err(AppError::cache)?;
            pool.health_check().await.map_err(AppError::cache)?;
            let store = RedisPresenceStore::connect(pool.clone(), RedisStoreConfig::from(&config.store))
                .map_err(AppError::cache)?;
            info!(connection = %store.connection_id(), "Redis presence store connected");

            (Arc::new(store), Some(pool))
        }
    };

    let presence = LifecycleCoordinator::spawn(
        &identities,
        store,
        CoordinatorConfig::from(&config.presence),
    );

    Ok(AgentState::new(presence, identities, redis, config))
}

/// Sign in with `AGENT_CLIENT_ID` / `AGENT_DISPLAY_NAME`, if configured
pub fn sign_in_configured(state: &AgentState) -> AppResult<()> {
    let agent = &state.config().agent;
    let Some(raw_id) = agent.client_id.as_deref() else {
        warn!("AGENT_CLIENT_ID not set, presence stays signed out");
        return Ok(());
    };

    let client_id = ClientId::parse(raw_id)
        .map_err(|e| AppError::InvalidInput(format!("AGENT_CLIENT_ID: {e}")))?;
    state
        .identities()
        .sign_in(Identity::new(client_id, agent.display_name.clone()));
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A signal that cannot be registered never fires, so a failed registration
/// leaves the process running instead of stopping it at once.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Run the agent until Ctrl+C or SIGTERM
///
/// On shutdown the live session is retracted before the process exits, so
/// other clients see this one go Offline immediately rather than after the
/// guarantee fires.
pub async fn run(config: AppConfig) -> AppResult<()> {
    let addr: SocketAddr = config
        .agent
        .address()
        .parse()
        .map_err(|e| AppError::InvalidInput(format!("AGENT_HOST/AGENT_PORT: {e}")))?;

    let state = create_agent_state(config, LocalIdentityProvider::new()).await?;
    sign_in_configured(&state)?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Server(format!("Failed to bind to {addr}: {e}")))?;
    info!("Presence agent listening on http://{addr}");

    let presence = state.presence().clone();
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, retracting presence");
            // Ends the coordinator, which also closes every WebSocket feed
            presence.shutdown().await;
        })
        .await
        .map_err(AppError::internal)?;

    info!("Presence agent stopped");
    Ok(())
}
