//! Message history endpoint

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use parlor_chats::Message;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

/// Stored message in its canonical wire shape
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "roomID")]
    pub room_id: String,
    pub message: String,
    pub username: String,
    pub sender: MessageSenderResponse,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageSenderResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Number of most recent messages, capped by the server's history limit
    pub limit: Option<i64>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            room_id: message.room_id,
            message: message.body,
            username: message.sender.name.clone(),
            sender: MessageSenderResponse {
                id: message.sender.id,
                name: message.sender.name,
            },
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// Create message routes
pub fn create_message_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/api/message/:room_id", get(list_messages))
}

#[utoipa::path(
    get,
    path = "/api/message/{room_id}",
    tag = "Messages",
    params(
        ("room_id" = String, Path, description = "Room identifier"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Room history, oldest first", body = Vec<MessageResponse>),
        (status = 404, description = "Room not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> GatewayResult<Json<Vec<MessageResponse>>> {
    if !state.rooms.exists(&room_id).await? {
        return Err(GatewayError::NotFound(format!("room {room_id}")));
    }

    let cap = state.realtime.history_limit;
    let limit = query.limit.map_or(cap, |limit| limit.clamp(1, cap.max(1)));

    let messages = state.messages.find_by_room(&room_id, limit).await?;
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}
