//! Room session: which room the client is viewing, its history fetch and
//! the realtime membership that goes with it.

use parlor_chats::{Message, Room, Sender};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{ChannelEvent, Realtime};
use crate::error::{ClientError, ClientResult};
use crate::message_list::{LiveOutcome, MessageList, RenderedMessage};
use crate::store::{HistorySource, MessageStore};

/// What the chat view should show around the message list.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Idle,
    Loading,
    Ready,
    Error(String),
}

/// Result of one [`RoomSession::next_update`] step.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    HistoryLoaded { room_id: String, count: usize },
    HistoryFailed { room_id: String, error: String },
    /// A fetch finished for a room that is no longer current
    StaleHistoryDiscarded { room_id: String },
    Message { message_id: String, outcome: LiveOutcome },
    /// Live message for a room other than the current one
    MessageIgnored { message_id: String },
    Presence { room: String, users: Vec<Sender> },
    ServerError(String),
    /// The channel gave up on a pending send; its row was removed
    SendDropped { nonce: String },
    Connected,
    ConnectionLost,
    ConnectionRestored,
    ChannelClosed,
}

struct HistoryResult {
    generation: u64,
    room_id: String,
    result: ClientResult<Vec<Message>>,
}

pub struct RoomSession<H, R> {
    user: Sender,
    store: MessageStore<H, R>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    channel_open: bool,
    history_tx: mpsc::UnboundedSender<HistoryResult>,
    history_rx: mpsc::UnboundedReceiver<HistoryResult>,
    current: Option<Room>,
    generation: u64,
    inflight: Option<JoinHandle<()>>,
    state: ViewState,
    list: MessageList,
    participants: Vec<Sender>,
}

impl<H, R> RoomSession<H, R>
where
    H: HistorySource + 'static,
    R: Realtime,
{
    pub fn new(
        user: Sender,
        store: MessageStore<H, R>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> Self {
        let (history_tx, history_rx) = mpsc::unbounded_channel();
        Self {
            user,
            store,
            events,
            channel_open: true,
            history_tx,
            history_rx,
            current: None,
            generation: 0,
            inflight: None,
            state: ViewState::Idle,
            list: MessageList::new(),
            participants: Vec::new(),
        }
    }

    /// Switch to `room`, or to no room with `None`.
    ///
    /// The previous room is left first and its in-flight history fetch is
    /// abandoned. History for the new room is requested before joining its
    /// broadcast group. Selecting the current room again does nothing.
    pub fn select_room(&mut self, room: Option<Room>) -> ClientResult<()> {
        let current_id = self.current.as_ref().map(|r| r.id.as_str());
        if current_id == room.as_ref().map(|r| r.id.as_str()) {
            return Ok(());
        }

        if let Some(previous) = self.reset() {
            self.store.realtime().leave(&previous.id)?;
        }
        let Some(room) = room else {
            return Ok(());
        };

        info!(room_id = %room.id, room = %room.name, "selecting room");
        self.state = ViewState::Loading;
        self.spawn_fetch(room.id.clone());
        self.store.realtime().join(&room.id, &self.user)?;
        self.current = Some(room);
        Ok(())
    }

    /// Leave the current room, if any.
    pub fn leave(&mut self) -> ClientResult<()> {
        match self.reset() {
            Some(previous) => self.store.realtime().leave(&previous.id),
            None => Ok(()),
        }
    }

    /// Send `body` to the current room and show it as pending until the
    /// server echo arrives. Returns the nonce of the pending entry.
    pub fn send(&mut self, body: &str) -> ClientResult<String> {
        if body.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        let room_id = self
            .current
            .as_ref()
            .map(|room| room.id.clone())
            .ok_or(ClientError::NoRoom)?;

        let nonce = self.store.send_message(&room_id, &self.user, body)?;
        self.list.push_pending(nonce.clone(), self.user.clone(), body);
        Ok(nonce)
    }

    /// Wait for the next history result or channel event and apply it.
    /// Returns `None` once the channel is closed and no fetch is pending.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        if !self.channel_open {
            if self.inflight.is_none() {
                return self.history_rx.try_recv().ok().map(|r| self.apply_history(r));
            }
            let result = self.history_rx.recv().await?;
            return Some(self.apply_history(result));
        }

        tokio::select! {
            Some(result) = self.history_rx.recv() => Some(self.apply_history(result)),
            event = self.events.recv() => Some(self.apply_event(event)),
        }
    }

    pub fn current_room(&self) -> Option<&Room> {
        self.current.as_ref()
    }

    pub fn user(&self) -> &Sender {
        &self.user
    }

    pub fn view_state(&self) -> &ViewState {
        &self.state
    }

    pub fn messages(&self) -> &MessageList {
        &self.list
    }

    /// Users announced in the current room, as last reported by the server.
    pub fn participants(&self) -> &[Sender] {
        &self.participants
    }

    pub fn render(&self) -> Vec<RenderedMessage> {
        self.list.render(&self.user.id)
    }

    pub fn take_autoscroll(&mut self) -> bool {
        self.list.take_autoscroll()
    }

    /// Drop all per-room state and return the room that was current.
    fn reset(&mut self) -> Option<Room> {
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
        self.generation += 1;
        self.list.clear();
        self.participants.clear();
        self.state = ViewState::Idle;
        self.current.take()
    }

    fn spawn_fetch(&mut self, room_id: String) {
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }

        let fetch = self.store.fetch_history(&room_id);
        let tx = self.history_tx.clone();
        let generation = self.generation;
        debug!(room_id = %room_id, generation, "requesting history");

        self.inflight = Some(tokio::spawn(async move {
            let result = fetch.await;
            let _ = tx.send(HistoryResult {
                generation,
                room_id,
                result,
            });
        }));
    }

    fn apply_history(&mut self, result: HistoryResult) -> SessionUpdate {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|room| room.id == result.room_id);
        if result.generation != self.generation || !is_current {
            debug!(room_id = %result.room_id, "discarding stale history");
            return SessionUpdate::StaleHistoryDiscarded {
                room_id: result.room_id,
            };
        }

        self.inflight = None;
        match result.result {
            Ok(messages) => {
                self.list.load_history(messages);
                self.state = ViewState::Ready;
                SessionUpdate::HistoryLoaded {
                    room_id: result.room_id,
                    count: self.list.len(),
                }
            }
            Err(error) => {
                warn!(room_id = %result.room_id, %error, "history fetch failed");
                self.state = ViewState::Error(error.to_string());
                SessionUpdate::HistoryFailed {
                    room_id: result.room_id,
                    error: error.to_string(),
                }
            }
        }
    }

    fn apply_event(&mut self, event: Option<ChannelEvent>) -> SessionUpdate {
        let Some(event) = event else {
            self.channel_open = false;
            return SessionUpdate::ChannelClosed;
        };

        match event {
            ChannelEvent::Message(mut message) => {
                let message_id = message.id.clone();
                let Some(room) = self.current.as_ref() else {
                    return SessionUpdate::MessageIgnored { message_id };
                };
                // The channel only delivers for the joined room.
                if message.room_id.is_empty() {
                    message.room_id = room.id.clone();
                }
                if message.room_id != room.id {
                    return SessionUpdate::MessageIgnored { message_id };
                }
                let outcome = self.list.push_live(message);
                SessionUpdate::Message { message_id, outcome }
            }
            ChannelEvent::Presence { room, users } => {
                if self.current.as_ref().is_some_and(|r| r.id == room) {
                    self.participants = users.clone();
                }
                SessionUpdate::Presence { room, users }
            }
            ChannelEvent::ServerError(message) => {
                warn!(%message, "server rejected a request");
                SessionUpdate::ServerError(message)
            }
            ChannelEvent::SendDropped { room, nonce } => {
                if self.current.as_ref().is_some_and(|r| r.id == room) {
                    self.list.discard_pending(&nonce);
                }
                SessionUpdate::SendDropped { nonce }
            }
            ChannelEvent::Connected => SessionUpdate::Connected,
            ChannelEvent::Disconnected => SessionUpdate::ConnectionLost,
            ChannelEvent::Reconnected => {
                // Recover anything broadcast while we were away.
                if let Some(room_id) = self.current.as_ref().map(|room| room.id.clone()) {
                    self.generation += 1;
                    self.spawn_fetch(room_id);
                }
                SessionUpdate::ConnectionRestored
            }
            ChannelEvent::Closed => {
                self.channel_open = false;
                SessionUpdate::ChannelClosed
            }
        }
    }
}

impl<H, R> Drop for RoomSession<H, R> {
    fn drop(&mut self) {
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
    }
}
