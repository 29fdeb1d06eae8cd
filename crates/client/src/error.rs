use thiserror::Error;

/// Errors surfaced by the client core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("realtime channel is closed")]
    ChannelClosed,

    #[error("no room selected")]
    NoRoom,

    #[error("message body is empty")]
    EmptyMessage,
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ClientError::Decode(error.to_string())
        } else {
            ClientError::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        ClientError::Decode(error.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
