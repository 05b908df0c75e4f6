//! Agent API Integration Tests
//!
//! Each test starts an agent on an ephemeral port, backed by the in-process
//! store, and drives it over HTTP and WebSocket.
//!
//! Run with: cargo test -p integration-tests --test agent_tests

use futures_util::StreamExt;
use integration_tests::{
    assert_json, assert_status, within, ErrorResponse, HealthResponse, OnlineStateResponse,
    SignInRequest, TestServer,
};
use presence_service::LifecyclePhase;
use reqwest::StatusCode;
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn next_state<S>(ws: &mut S) -> OnlineStateResponse
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match within(ws.next()).await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => {}
            other => panic!("WebSocket ended unexpectedly: {other:?}"),
        }
    }
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health").await.expect("Request failed");
    let health: HealthResponse = assert_json(response, StatusCode::OK).await.unwrap();

    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
    assert_eq!(health.phase, "idle");
}

#[tokio::test]
async fn test_health_ready() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health/ready").await.expect("Request failed");
    assert_status(response, StatusCode::OK).await.unwrap();
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_online_requires_session() {
    let server = TestServer::start().await.expect("Failed to start server");
    within(server.state.presence().view().wait_until(|s| !s.loading)).await;

    let response = server.get("/online").await.unwrap();
    let state: OnlineStateResponse = assert_json(response, StatusCode::OK).await.unwrap();

    assert!(state.users.is_empty());
    assert!(!state.loading);
    assert_eq!(state.error.as_deref(), Some("Not authenticated"));
}

#[tokio::test]
async fn test_sign_in_lists_self_then_sign_out() {
    let server = TestServer::start().await.expect("Failed to start server");
    let request = SignInRequest::unique();

    let response = server.put("/session", &request).await.unwrap();
    assert_status(response, StatusCode::ACCEPTED).await.unwrap();
    within(server.state.presence().wait_for_phase(LifecyclePhase::Active)).await;
    within(server.state.presence().view().wait_until(|s| !s.users.is_empty())).await;

    let response = server.get("/online").await.unwrap();
    let state: OnlineStateResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(state.ids(), vec![request.id.as_str()]);
    assert_eq!(Some(state.users[0].name.clone()), request.name);
    assert!(state.error.is_none());

    let response = server.delete("/session").await.unwrap();
    assert_status(response, StatusCode::ACCEPTED).await.unwrap();
    within(server.state.presence().wait_for_phase(LifecyclePhase::Idle)).await;

    let response = server.get("/online").await.unwrap();
    let state: OnlineStateResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert!(state.users.is_empty());
    assert_eq!(state.error.as_deref(), Some("Not authenticated"));
}

#[tokio::test]
async fn test_sign_in_rejects_invalid_id() {
    let server = TestServer::start().await.expect("Failed to start server");
    let request = SignInRequest {
        id: "not/valid".to_string(),
        name: None,
    };

    let response = server.put("/session", &request).await.unwrap();
    let error: ErrorResponse = assert_json(response, StatusCode::BAD_REQUEST).await.unwrap();
    assert_eq!(error.code, "INVALID_INPUT");
    assert!(!error.message.is_empty());
}

// ============================================================================
// WebSocket Tests
// ============================================================================

#[tokio::test]
async fn test_websocket_pushes_state_changes() {
    let server = TestServer::start().await.expect("Failed to start server");
    within(server.state.presence().view().wait_until(|s| !s.loading)).await;

    let (mut ws, _) = connect_async(server.ws_url("/online/ws"))
        .await
        .expect("WebSocket connect failed");

    let initial = next_state(&mut ws).await;
    assert!(initial.users.is_empty());
    assert_eq!(initial.error.as_deref(), Some("Not authenticated"));

    let request = SignInRequest::unique();
    let response = server.put("/session", &request).await.unwrap();
    assert_status(response, StatusCode::ACCEPTED).await.unwrap();

    // Intermediate states (loading) may or may not be observed
    loop {
        let state = next_state(&mut ws).await;
        if !state.loading && !state.users.is_empty() {
            assert_eq!(state.ids(), vec![request.id.as_str()]);
            assert!(state.error.is_none());
            break;
        }
    }
}

#[tokio::test]
async fn test_websocket_closes_on_shutdown() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (mut ws, _) = connect_async(server.ws_url("/online/ws"))
        .await
        .expect("WebSocket connect failed");
    let _ = next_state(&mut ws).await;

    within(server.state.presence().shutdown()).await;

    loop {
        match within(ws.next()).await {
            None | Some(Ok(Message::Close(_)) | Err(_)) => break,
            Some(Ok(_)) => {}
        }
    }
}
