//! Agent HTTP server
//!
//! Routes exposing the online users state.

mod handlers;
mod state;
mod ws;

pub use handlers::{HealthResponse, ReadinessResponse, SignInRequest};
pub use state::AgentState;
pub use ws::online_ws_handler;

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::{health_check, online_users, readiness_check, sign_in, sign_out};

/// Create the agent router
pub fn create_router() -> Router<AgentState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/online", get(online_users))
        .route("/online/ws", get(online_ws_handler))
        .route("/session", put(sign_in).delete(sign_out))
}

/// Build the complete application
pub fn create_app(state: AgentState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
