//! Error types for the database layer

use thiserror::Error;

/// General database error
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),
}

/// Chat-specific database errors
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for ChatError {
    fn from(error: sqlx::Error) -> Self {
        ChatError::DatabaseError(error.to_string())
    }
}
