//! # Parlor Client Crate
//!
//! The non-presentation half of a chat view.
//!
//! - [`RoomSession`] tracks the room being viewed and drives everything else
//! - [`MessageStore`] reads history over HTTP and sends through the channel
//! - [`RealtimeChannel`] owns the WebSocket, reconnecting and resubscribing
//! - [`MessageList`] keeps the ordered, render-ready messages
//!
//! ```rust,no_run
//! use parlor_chats::{Room, Sender};
//! use parlor_config::ClientConfig;
//!
//! # async fn run() -> Result<(), parlor_client::ClientError> {
//! let mut session = parlor_client::connect(&ClientConfig::default(), Sender::new("u1", "Ann"));
//! session.select_room(Some(Room::new("r1", "General")))?;
//! while let Some(update) = session.next_update().await {
//!     for row in session.render() {
//!         println!("{:?} {}: {}", row.alignment, row.sender_name, row.body);
//!     }
//!     # let _ = update;
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod error;
pub mod message_list;
pub mod session;
pub mod store;

pub use channel::{backoff_delay, ChannelEvent, ChannelSettings, Realtime, RealtimeChannel};
pub use error::{ClientError, ClientResult};
pub use message_list::{Alignment, LiveOutcome, MessageList, RenderedMessage};
pub use session::{RoomSession, SessionUpdate, ViewState};
pub use store::{HistorySource, HttpHistory, MessageStore};

use parlor_chats::Sender;
use parlor_config::ClientConfig;

/// Open the realtime channel and build a session for `user` against the
/// server configured in `config`. Must be called inside a tokio runtime.
pub fn connect(config: &ClientConfig, user: Sender) -> RoomSession<HttpHistory, RealtimeChannel> {
    let (channel, events) = RealtimeChannel::connect(ChannelSettings::from(config));
    let store = MessageStore::new(HttpHistory::new(config.base_url.clone()), channel);
    RoomSession::new(user, store, events)
}
