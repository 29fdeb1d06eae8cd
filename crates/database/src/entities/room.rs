//! Room row definitions

use parlor_chats::Room;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RoomRecord {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl From<RoomRecord> for Room {
    fn from(record: RoomRecord) -> Self {
        Room {
            id: record.id,
            name: record.name,
        }
    }
}
