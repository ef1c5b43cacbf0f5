//! WebSocket endpoint for real-time queue viewers.
//!
//! Each connection registers with the broadcast hub and is forwarded
//! every queue event as a JSON text frame. Clients are not expected to
//! send anything; inbound frames are logged and otherwise ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_MESSAGES_SENT};
use crate::state::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let hub = Arc::clone(state.hub());
    let (connection_id, mut rx) = hub.connect();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!(connection = %connection_id, "WebSocket viewer connected");

    // Forward queue events to this client until its channel closes.
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            WS_MESSAGES_SENT
                .with_label_values(&[event.command.as_str()])
                .inc();

            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize queue event: {}", e);
                }
            }
        }
    });

    // Handle incoming messages from client (ping/pong, close)
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!(connection = %connection_id, "WebSocket client requested close");
                break;
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by axum
                debug!("Received ping: {:?}", data);
            }
            Ok(Message::Text(text)) => {
                debug!("Received text message: {}", text);
            }
            Ok(_) => {
                // Ignore other message types
            }
            Err(e) => {
                warn!(connection = %connection_id, "WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // Clean up
    hub.disconnect(connection_id);
    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!(connection = %connection_id, "WebSocket viewer disconnected");
}
