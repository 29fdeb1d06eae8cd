//! Message entity and its wire representation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::MessageError;

/// Author of a message as shown to participants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sender {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

impl Sender {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A stored chat message in its normalised form.
///
/// Every message crossing the wire goes through [`WireMessage`], so a
/// `Message` always carries a sender object regardless of whether the peer
/// sent a bare id or a populated record. `room_id` is empty when the peer
/// left it out; readers that know the room fill it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage", into = "WireMessage")]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub sender: Sender,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Client token echoed on the live broadcast of the sender's own message.
    pub nonce: Option<String>,
}

impl Message {
    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender.id == user_id
    }
}

/// `sender` appears as an id in outbound payloads and as an object in
/// populated history records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SenderField {
    Id(String),
    Object {
        #[serde(rename = "_id")]
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "_id")]
    pub id: String,
    /// Absent on records that are only meaningful within a known room
    #[serde(rename = "roomID", default)]
    pub room_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub sender: SenderField,
    /// Receipt time stands in when the peer omits it
    #[serde(rename = "createdAt", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl TryFrom<WireMessage> for Message {
    type Error = MessageError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        if wire.id.trim().is_empty() {
            return Err(MessageError::MissingField("_id"));
        }
        let (sender_id, sender_name) = match wire.sender {
            SenderField::Id(id) => (id, None),
            SenderField::Object { id, name } => (id, name),
        };
        if sender_id.trim().is_empty() {
            return Err(MessageError::MissingField("sender._id"));
        }

        // Display name preference: populated sender, then the flat username,
        // then the id itself.
        let name = sender_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| wire.username.filter(|name| !name.trim().is_empty()))
            .unwrap_or_else(|| sender_id.clone());

        Ok(Message {
            id: wire.id,
            room_id: wire.room_id,
            sender: Sender {
                id: sender_id,
                name,
            },
            body: wire.message,
            created_at: wire.created_at,
            nonce: wire.nonce,
        })
    }
}

impl From<Message> for WireMessage {
    fn from(message: Message) -> Self {
        WireMessage {
            id: message.id,
            room_id: message.room_id,
            message: message.body,
            username: Some(message.sender.name.clone()),
            sender: SenderField::Object {
                id: message.sender.id,
                name: Some(message.sender.name),
            },
            created_at: message.created_at,
            nonce: message.nonce,
        }
    }
}
