//! WebSocket push of the online users state

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

use super::AgentState;

/// Push every online users state change to the client
///
/// GET /online/ws
pub async fn online_ws_handler(
    State(state): State<AgentState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| push_online_users(state, socket))
}

async fn push_online_users(state: AgentState, socket: WebSocket) {
    let mut updates = state.presence().view().watch();
    let (mut ws_sink, mut ws_stream) = socket.split();
    tracing::debug!("Online users WebSocket opened");

    // Clients only ever close; anything else they send is ignored
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        loop {
            let current = updates.borrow_and_update().clone();
            let json = match serde_json::to_string(&current) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode online users state");
                    break;
                }
            };
            if ws_sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            // Err once the coordinator has stopped
            if updates.changed().await.is_err() {
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    }

    tracing::debug!("Online users WebSocket closed");
}
