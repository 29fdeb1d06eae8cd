//! Event types for the realtime delivery channel.
//!
//! Every WebSocket text frame carries one event encoded as
//! `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::entities::{Message, Sender};

/// Events sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Join the broadcast group of a room
    #[serde(rename = "room")]
    Room { room: String },

    /// Announce the connected user in a room
    #[serde(rename = "add-user")]
    AddUser { user: Sender, room: String },

    /// Request persistence and broadcast of a new message
    #[serde(rename = "sendMessage")]
    SendMessage(OutgoingMessage),

    /// Release membership of a room
    #[serde(rename = "leaveRoom")]
    LeaveRoom { room: String },
}

/// Outbound message as the client submits it. `sender` is the bare user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub sender: String,
    pub username: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Events sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A stored message broadcast to the room
    #[serde(rename = "receiveMessage")]
    ReceiveMessage { message: Message },

    /// Current participants of a room
    #[serde(rename = "presence")]
    Presence { room: String, users: Vec<Sender> },

    /// A client request was rejected
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}
