//! Shared application state for the gateway

use parlor_config::{DatabaseConfig, RealtimeConfig};
use parlor_database::{MessageRepository, RoomRepository};
use sqlx::SqlitePool;

use crate::error::{GatewayError, GatewayResult};
use crate::websocket::RoomHub;

/// Shared application state
#[derive(Clone)]
pub struct GatewayState {
    /// Database connection pool
    pub pool: SqlitePool,
    pub rooms: RoomRepository,
    pub messages: MessageRepository,
    /// Live room broadcast groups and participants
    pub hub: RoomHub,
    pub realtime: RealtimeConfig,
}

impl GatewayState {
    pub fn new(pool: SqlitePool, realtime: RealtimeConfig) -> Self {
        Self {
            rooms: RoomRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            hub: RoomHub::new(realtime.broadcast_capacity),
            pool,
            realtime,
        }
    }

    /// Create gateway state from database configuration, running migrations
    pub async fn from_config(
        database: &DatabaseConfig,
        realtime: RealtimeConfig,
    ) -> GatewayResult<Self> {
        let pool = parlor_database::initialize_database(database)
            .await
            .map_err(|e| GatewayError::DatabaseError(format!("Failed to initialize database: {}", e)))?;

        Ok(Self::new(pool, realtime))
    }
}
