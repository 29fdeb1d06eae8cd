//! Row types for the repository layer

pub mod message;
pub mod room;

pub use message::{CreateMessageRequest, MessageRecord};
pub use room::RoomRecord;
