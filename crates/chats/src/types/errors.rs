//! Error types for chat payloads.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("missing or empty field: {0}")]
    MissingField(&'static str),

    #[error("message body cannot be empty")]
    EmptyBody,

    #[error("message body too long ({length} > {max} characters)")]
    BodyTooLong { length: usize, max: usize },
}
