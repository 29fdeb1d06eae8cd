//! REST API endpoints for the gateway

pub mod health;
pub mod message;
pub mod room;

use axum::Router;
use crate::state::GatewayState;
use std::sync::Arc;

/// Create all REST API routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .merge(health::create_health_routes())
        .merge(message::create_message_routes())
        .merge(room::create_room_routes())
}

pub use health::HealthResponse;
pub use message::{MessageResponse, MessageSenderResponse};
pub use room::RoomResponse;
