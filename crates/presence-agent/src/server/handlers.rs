//! HTTP handlers

use axum::{extract::State, http::StatusCode, Json};
use presence_core::{ClientId, Identity};
use presence_service::{LifecyclePhase, OnlineUsersState};
use serde::{Deserialize, Serialize};

use super::AgentState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub phase: LifecyclePhase,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub store: &'static str,
    pub coordinator_running: bool,
    pub store_reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Liveness probe
///
/// GET /health
pub async fn health_check(State(state): State<AgentState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        phase: state.presence().phase(),
    })
}

/// Readiness probe: coordinator alive and store reachable
///
/// GET /health/ready
pub async fn readiness_check(
    State(state): State<AgentState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let (store, store_reachable) = match state.redis() {
        Some(pool) => ("redis", pool.health_check().await.is_ok()),
        None => ("memory", true),
    };
    let coordinator_running = state.presence().is_running();
    let ready = coordinator_running && store_reachable;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready,
            store,
            coordinator_running,
            store_reachable,
        }),
    )
}

/// Current online users state
///
/// GET /online
pub async fn online_users(State(state): State<AgentState>) -> Json<OnlineUsersState> {
    Json(state.presence().view().current())
}

/// Sign in as another identity
///
/// PUT /session
pub async fn sign_in(
    State(state): State<AgentState>,
    Json(request): Json<SignInRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let client_id = ClientId::parse(&request.id).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                code: "INVALID_INPUT",
                message: e.to_string(),
            }),
        )
    })?;

    state
        .identities()
        .sign_in(Identity::new(client_id, request.name));
    Ok(StatusCode::ACCEPTED)
}

/// Sign out
///
/// DELETE /session
pub async fn sign_out(State(state): State<AgentState>) -> StatusCode {
    state.identities().sign_out();
    StatusCode::ACCEPTED
}
