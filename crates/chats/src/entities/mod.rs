//! Chat domain entities

pub mod message;
pub mod room;

pub use message::{Message, Sender, SenderField, WireMessage};
pub use room::Room;
