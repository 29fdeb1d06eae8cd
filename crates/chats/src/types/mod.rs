//! Shared types for the realtime channel.

pub mod errors;
pub mod events;

pub use errors::MessageError;
pub use events::{ClientEvent, OutgoingMessage, ServerEvent};
