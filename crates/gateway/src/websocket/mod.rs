//! Realtime delivery over WebSocket

pub mod connection;
pub mod handler;
pub mod hub;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::GatewayState;

pub use connection::ChatConnection;
pub use handler::websocket_handler;
pub use hub::{ConnectionId, RoomHub};

/// Create all WebSocket routes
pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(websocket_handler))
}
