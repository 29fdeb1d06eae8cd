//! WebSocket upgrade and socket pumping

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use parlor_chats::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::state::GatewayState;
use crate::websocket::ChatConnection;

const OUTBOUND_QUEUE: usize = 100;

/// WebSocket upgrade handler for the realtime channel
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut ws_sender, mut receiver) = socket.split();

    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_QUEUE);
    let mut connection = ChatConnection::new(state, out_tx.clone());
    let connection_id = connection.id();
    info!(connection = connection_id, "websocket connected");

    let sender_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!(connection = connection_id, error = %e, "failed to encode server event");
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::Text(json)).await {
                debug!(connection = connection_id, error = %e, "websocket send failed");
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let result = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => connection.handle(event).await,
                    Err(e) => Err(GatewayError::from(e)),
                };

                if let Err(e) = result {
                    warn!(connection = connection_id, error = %e, "rejected client event");
                    if out_tx.send(ServerEvent::error(e.to_string())).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection = connection_id, error = %e, "websocket receive failed");
                break;
            }
        }
    }

    connection.release().await;
    drop(connection);
    drop(out_tx);
    let _ = sender_task.await;
    info!(connection = connection_id, "websocket disconnected");
}
