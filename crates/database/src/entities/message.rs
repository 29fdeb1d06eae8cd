//! Message row definitions

use chrono::{DateTime, Utc};
use parlor_chats::{Message, Sender};

use crate::types::ChatError;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MessageRecord {
    pub id: i64,
    pub public_id: String,
    pub room_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateMessageRequest {
    pub room_id: String,
    pub sender: Sender,
    pub body: String,
}

impl TryFrom<MessageRecord> for Message {
    type Error = ChatError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let created_at = DateTime::parse_from_rfc3339(&record.created_at)
            .map_err(|e| {
                ChatError::InvalidRecord(format!(
                    "message {} has bad created_at {:?}: {}",
                    record.public_id, record.created_at, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(Message {
            id: record.public_id,
            room_id: record.room_id,
            sender: Sender {
                id: record.sender_id,
                name: record.sender_name,
            },
            body: record.body,
            created_at,
            nonce: None,
        })
    }
}
