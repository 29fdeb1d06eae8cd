//! Room broadcast groups

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parlor_chats::{Sender, ServerEvent};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Identifies one WebSocket connection for the lifetime of the process.
pub type ConnectionId = u64;

struct RoomGroup {
    sender: broadcast::Sender<ServerEvent>,
    /// Connections joined to the room; `None` until the user is announced.
    participants: HashMap<ConnectionId, Option<Sender>>,
}

/// Tracks which connections are joined to which room and fans events out to
/// them. A group exists only while it has at least one participant.
#[derive(Clone)]
pub struct RoomHub {
    rooms: Arc<RwLock<HashMap<String, RoomGroup>>>,
    next_connection: Arc<AtomicU64>,
    capacity: usize,
}

impl RoomHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            next_connection: Arc::new(AtomicU64::new(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    /// Add a connection to a room's group and subscribe it to the broadcasts.
    pub async fn join(&self, room_id: &str, connection: ConnectionId) -> broadcast::Receiver<ServerEvent> {
        let mut rooms = self.rooms.write().await;
        let group = rooms.entry(room_id.to_string()).or_insert_with(|| RoomGroup {
            sender: broadcast::channel(self.capacity).0,
            participants: HashMap::new(),
        });
        group.participants.entry(connection).or_insert(None);

        debug!(room_id, connection, members = group.participants.len(), "joined room group");
        group.sender.subscribe()
    }

    /// Attach a user identity to a joined connection and publish presence.
    /// Returns false when the connection is not in the room.
    pub async fn identify(&self, room_id: &str, connection: ConnectionId, user: Sender) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(group) = rooms.get_mut(room_id) else {
            return false;
        };
        let Some(slot) = group.participants.get_mut(&connection) else {
            return false;
        };
        *slot = Some(user);

        Self::publish_presence(room_id, group);
        true
    }

    /// Remove a connection from a room. Returns false if it was not a member.
    pub async fn leave(&self, room_id: &str, connection: ConnectionId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(group) = rooms.get_mut(room_id) else {
            return false;
        };
        let Some(identity) = group.participants.remove(&connection) else {
            return false;
        };

        if group.participants.is_empty() {
            rooms.remove(room_id);
            debug!(room_id, "dropped empty room group");
        } else if identity.is_some() {
            Self::publish_presence(room_id, group);
        }
        true
    }

    /// Send an event to every connection in the room. Returns the number of
    /// receivers that got it.
    pub async fn broadcast(&self, room_id: &str, event: ServerEvent) -> usize {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .and_then(|group| group.sender.send(event).ok())
            .unwrap_or(0)
    }

    pub async fn is_member(&self, room_id: &str, connection: ConnectionId) -> bool {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .is_some_and(|group| group.participants.contains_key(&connection))
    }

    /// Announced users of a room, one entry per user id.
    pub async fn participants(&self, room_id: &str) -> Vec<Sender> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .map(Self::users_of)
            .unwrap_or_default()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    fn users_of(group: &RoomGroup) -> Vec<Sender> {
        let unique: BTreeMap<&str, &Sender> = group
            .participants
            .values()
            .flatten()
            .map(|user| (user.id.as_str(), user))
            .collect();
        unique.into_values().cloned().collect()
    }

    fn publish_presence(room_id: &str, group: &RoomGroup) {
        let event = ServerEvent::Presence {
            room: room_id.to_string(),
            users: Self::users_of(group),
        };
        // No receivers just means nobody is listening yet.
        let _ = group.sender.send(event);
    }
}
