//! # Parlor Gateway Crate
//!
//! HTTP and WebSocket surface of the chat server.
//!
//! ## Architecture
//!
//! - **REST**: room directory and message history with OpenAPI documentation
//! - **WebSocket**: the realtime channel, one room broadcast group per room
//! - **State**: repositories plus the live [`RoomHub`]
//! - **Middleware**: CORS and request tracing
//!
//! ## Usage
//!
//! ```rust,no_run
//! use parlor_config::{DatabaseConfig, RealtimeConfig};
//! use parlor_gateway::{create_router, GatewayState};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let state = GatewayState::from_config(&DatabaseConfig::default(), RealtimeConfig::default()).await?;
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
//! axum::serve(listener, create_router(state)).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{ErrorResponse, GatewayError, GatewayResult};
pub use state::GatewayState;
pub use websocket::{ChatConnection, ConnectionId, RoomHub};

use axum::{routing::get, Json, Router};
use std::sync::Arc;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        rest::health::health_check,
        rest::message::list_messages,
        rest::room::list_rooms,
        rest::room::get_room,
    ),
    components(schemas(
        rest::HealthResponse,
        rest::MessageResponse,
        rest::MessageSenderResponse,
        rest::RoomResponse,
        ErrorResponse,
    )),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Messages", description = "Room message history"),
        (name = "Rooms", description = "Room directory"),
    )
)]
pub struct ApiDoc;

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);

    Router::new()
        .merge(rest::create_rest_routes())
        .merge(websocket::create_websocket_routes())
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(arc_state)
        .layer(middleware::create_cors_middleware())
        .layer(middleware::create_trace_middleware())
}
