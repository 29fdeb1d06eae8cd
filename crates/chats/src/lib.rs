//! # Parlor Chats Crate
//!
//! Domain entities and wire types shared by the Parlor server and client.
//!
//! ## Architecture
//!
//! - **Entities**: `Room`, `Message`, `Sender`, plus the raw `WireMessage` shape
//!   that every inbound payload is normalised from
//! - **Types**: realtime channel events and error definitions
//! - **Utils**: input validation shared by both sides of the channel
//!
//! ## Usage
//!
//! ```rust
//! use parlor_chats::{Message, ServerEvent};
//!
//! let frame = r#"{"event":"receiveMessage","data":{"message":{
//!     "_id":"m1","roomID":"r1","message":"hi","sender":"u1","username":"Ann",
//!     "createdAt":"2024-05-01T10:00:00Z"}}}"#;
//! let ServerEvent::ReceiveMessage { message } = serde_json::from_str(frame).unwrap() else {
//!     panic!("expected a message");
//! };
//! assert_eq!(message.sender.name, "Ann");
//! ```

pub mod entities;
pub mod types;
pub mod utils;

pub use entities::{Message, Room, Sender, SenderField, WireMessage};
pub use types::{ClientEvent, MessageError, OutgoingMessage, ServerEvent};
pub use utils::validation::Validator;
