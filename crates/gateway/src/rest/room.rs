//! Room directory endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use parlor_chats::Room;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// Users currently announced in the room
    pub online: usize,
}

impl RoomResponse {
    fn new(room: Room, online: usize) -> Self {
        Self {
            id: room.id,
            name: room.name,
            online,
        }
    }
}

/// Create room routes
pub fn create_room_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/:room_id", get(get_room))
}

#[utoipa::path(
    get,
    path = "/api/rooms",
    tag = "Rooms",
    responses(
        (status = 200, description = "All rooms ordered by name", body = Vec<RoomResponse>)
    )
)]
pub async fn list_rooms(
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Json<Vec<RoomResponse>>> {
    let rooms = state.rooms.list().await?;

    let mut responses = Vec::with_capacity(rooms.len());
    for room in rooms {
        let online = state.hub.participants(&room.id).await.len();
        responses.push(RoomResponse::new(room, online));
    }
    Ok(Json(responses))
}

#[utoipa::path(
    get,
    path = "/api/rooms/{room_id}",
    tag = "Rooms",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room details", body = RoomResponse),
        (status = 404, description = "Room not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_room(
    State(state): State<Arc<GatewayState>>,
    Path(room_id): Path<String>,
) -> GatewayResult<Json<RoomResponse>> {
    let room = state
        .rooms
        .find_by_id(&room_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("room {room_id}")))?;

    let online = state.hub.participants(&room.id).await.len();
    Ok(Json(RoomResponse::new(room, online)))
}
