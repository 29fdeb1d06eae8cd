//! Repository for message data access operations.

use chrono::{SecondsFormat, Utc};
use parlor_chats::Message;
use sqlx::SqlitePool;
use tracing::info;

use crate::entities::{CreateMessageRequest, MessageRecord};
use crate::types::{ChatError, ChatResult};

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent `limit` messages of a room, oldest first
    pub async fn find_by_room(&self, room_id: &str, limit: i64) -> ChatResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, public_id, room_id, sender_id, sender_name, body, created_at FROM (
                 SELECT id, public_id, room_id, sender_id, sender_name, body, created_at
                 FROM messages WHERE room_id = ? ORDER BY id DESC LIMIT ?
             ) ORDER BY id ASC",
        )
        .bind(room_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Message::try_from).collect()
    }

    /// Persist a new message; the room must exist
    pub async fn create(&self, request: &CreateMessageRequest) -> ChatResult<Message> {
        let room_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM rooms WHERE id = ?")
            .bind(&request.room_id)
            .fetch_optional(&self.pool)
            .await?;
        if room_exists.is_none() {
            return Err(ChatError::RoomNotFound(request.room_id.clone()));
        }

        let public_id = cuid2::create_id();
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let result = sqlx::query(
            "INSERT INTO messages (public_id, room_id, sender_id, sender_name, body, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&request.room_id)
        .bind(&request.sender.id)
        .bind(&request.sender.name)
        .bind(&request.body)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        info!(
            message_id = result.last_insert_rowid(),
            public_id = %public_id,
            room_id = %request.room_id,
            sender_id = %request.sender.id,
            "created new message"
        );

        Message::try_from(MessageRecord {
            id: result.last_insert_rowid(),
            public_id,
            room_id: request.room_id.clone(),
            sender_id: request.sender.id.clone(),
            sender_name: request.sender.name.clone(),
            body: request.body.clone(),
            created_at: now,
        })
    }

    pub async fn count_for_room(&self, room_id: &str) -> ChatResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE room_id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
