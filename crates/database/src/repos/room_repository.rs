//! Repository for room data access operations.

use chrono::Utc;
use parlor_chats::Room;
use parlor_config::RoomSeed;
use sqlx::SqlitePool;
use tracing::info;

use crate::entities::RoomRecord;
use crate::types::ChatResult;

/// Repository for room database operations
#[derive(Clone)]
pub struct RoomRepository {
    pool: SqlitePool,
}

impl RoomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a room or refresh the name of an existing one
    pub async fn upsert(&self, room: &Room) -> ChatResult<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO rooms (id, name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(&room.id)
        .bind(&room.name)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Provision the rooms listed in configuration
    pub async fn seed(&self, seeds: &[RoomSeed]) -> ChatResult<usize> {
        for seed in seeds {
            self.upsert(&Room::new(seed.id.clone(), seed.name.clone()))
                .await?;
        }

        if !seeds.is_empty() {
            info!(count = seeds.len(), "seeded rooms from configuration");
        }
        Ok(seeds.len())
    }

    pub async fn find_by_id(&self, room_id: &str) -> ChatResult<Option<Room>> {
        let record = sqlx::query_as::<_, RoomRecord>(
            "SELECT id, name, created_at FROM rooms WHERE id = ?",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Room::from))
    }

    pub async fn exists(&self, room_id: &str) -> ChatResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    /// List all rooms ordered by name
    pub async fn list(&self) -> ChatResult<Vec<Room>> {
        let records = sqlx::query_as::<_, RoomRecord>(
            "SELECT id, name, created_at FROM rooms ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Room::from).collect())
    }
}
