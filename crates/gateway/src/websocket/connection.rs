//! Per-connection room membership and event dispatch

use std::sync::Arc;

use parlor_chats::{ClientEvent, OutgoingMessage, Sender, ServerEvent, Validator};
use parlor_database::CreateMessageRequest;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;
use crate::websocket::hub::ConnectionId;

/// State of one socket: at most one joined room at a time, plus the task
/// that forwards that room's broadcasts into the socket's outbound queue.
pub struct ChatConnection {
    id: ConnectionId,
    state: Arc<GatewayState>,
    out_tx: mpsc::Sender<ServerEvent>,
    room: Option<String>,
    user: Option<Sender>,
    forwarder: Option<JoinHandle<()>>,
}

impl ChatConnection {
    pub fn new(state: Arc<GatewayState>, out_tx: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: state.hub.next_connection_id(),
            state,
            out_tx,
            room: None,
            user: None,
            forwarder: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn current_room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub async fn handle(&mut self, event: ClientEvent) -> GatewayResult<()> {
        match event {
            ClientEvent::Room { room } => self.join(room).await,
            ClientEvent::AddUser { user, room } => self.add_user(user, room).await,
            ClientEvent::SendMessage(outgoing) => self.send_message(outgoing).await,
            ClientEvent::LeaveRoom { room } => {
                if self.room.as_deref() == Some(room.as_str()) {
                    self.release().await;
                } else {
                    debug!(connection = self.id, room = %room, "leave for a room not joined");
                }
                Ok(())
            }
        }
    }

    async fn join(&mut self, room: String) -> GatewayResult<()> {
        if self.room.as_deref() == Some(room.as_str()) {
            return Ok(());
        }
        if !self.state.rooms.exists(&room).await? {
            return Err(GatewayError::NotFound(format!("room {room}")));
        }

        self.release().await;

        let receiver = self.state.hub.join(&room, self.id).await;
        self.forwarder = Some(spawn_forwarder(
            self.id,
            room.clone(),
            receiver,
            self.out_tx.clone(),
        ));
        info!(connection = self.id, room = %room, "connection joined room");

        // A known user follows the connection into the new room.
        if let Some(user) = self.user.clone() {
            self.state.hub.identify(&room, self.id, user).await;
        }
        self.room = Some(room);
        Ok(())
    }

    async fn add_user(&mut self, user: Sender, room: String) -> GatewayResult<()> {
        if user.id.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("user id is required".to_string()));
        }
        if self.room.as_deref() != Some(room.as_str()) {
            return Err(GatewayError::NotJoined(room));
        }

        self.user = Some(user.clone());
        self.state.hub.identify(&room, self.id, user).await;
        Ok(())
    }

    async fn send_message(&mut self, outgoing: OutgoingMessage) -> GatewayResult<()> {
        if self.room.as_deref() != Some(outgoing.room_id.as_str()) {
            return Err(GatewayError::NotJoined(outgoing.room_id));
        }
        if outgoing.sender.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("sender is required".to_string()));
        }
        Validator::message_body(&outgoing.message, self.state.realtime.max_message_length)?;

        let name = if outgoing.username.trim().is_empty() {
            outgoing.sender.clone()
        } else {
            outgoing.username
        };
        let request = CreateMessageRequest {
            room_id: outgoing.room_id,
            sender: Sender::new(outgoing.sender, name),
            body: outgoing.message,
        };

        let mut message = self.state.messages.create(&request).await?;
        message.nonce = outgoing.nonce;

        let room_id = message.room_id.clone();
        let delivered = self
            .state
            .hub
            .broadcast(&room_id, ServerEvent::ReceiveMessage { message })
            .await;
        debug!(connection = self.id, room = %room_id, delivered, "message broadcast");
        Ok(())
    }

    /// Leave the joined room, if any, and stop forwarding its broadcasts.
    pub async fn release(&mut self) {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
        if let Some(room) = self.room.take() {
            self.state.hub.leave(&room, self.id).await;
            info!(connection = self.id, room = %room, "connection left room");
        }
    }
}

impl Drop for ChatConnection {
    fn drop(&mut self) {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
    }
}

fn spawn_forwarder(
    connection: ConnectionId,
    room: String,
    mut receiver: broadcast::Receiver<ServerEvent>,
    out_tx: mpsc::Sender<ServerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if out_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(connection, room = %room, skipped, "connection lagged behind room broadcast");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_chats::Room;
    use parlor_config::{DatabaseConfig, RealtimeConfig};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    async fn state() -> (Arc<GatewayState>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let database = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("gateway.db").display()),
            max_connections: 2,
        };
        let realtime = RealtimeConfig {
            max_message_length: 10,
            ..RealtimeConfig::default()
        };
        let state = GatewayState::from_config(&database, realtime).await.unwrap();
        state.rooms.upsert(&Room::new("r1", "General")).await.unwrap();
        state.rooms.upsert(&Room::new("r2", "Random")).await.unwrap();
        (Arc::new(state), temp_dir)
    }

    fn connection(state: &Arc<GatewayState>) -> (ChatConnection, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(32);
        (ChatConnection::new(state.clone(), tx), rx)
    }

    async fn next(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("outbound queue closed")
    }

    fn outgoing(room: &str, body: &str, nonce: Option<&str>) -> ClientEvent {
        ClientEvent::SendMessage(OutgoingMessage {
            room_id: room.to_string(),
            sender: "u1".to_string(),
            username: "Ann".to_string(),
            message: body.to_string(),
            nonce: nonce.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_joined_sender_receives_echo_with_nonce() {
        let (state, _dir) = state().await;
        let (mut conn, mut rx) = connection(&state);

        conn.handle(ClientEvent::Room { room: "r1".into() }).await.unwrap();
        conn.handle(outgoing("r1", "hi", Some("n-1"))).await.unwrap();

        match next(&mut rx).await {
            ServerEvent::ReceiveMessage { message } => {
                assert_eq!(message.body, "hi");
                assert_eq!(message.sender, Sender::new("u1", "Ann"));
                assert_eq!(message.nonce.as_deref(), Some("n-1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(state.messages.count_for_room("r1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_send_without_join_is_rejected() {
        let (state, _dir) = state().await;
        let (mut conn, _rx) = connection(&state);

        let error = conn.handle(outgoing("r1", "hi", None)).await.unwrap_err();
        assert!(matches!(error, GatewayError::NotJoined(room) if room == "r1"));
        assert_eq!(state.messages.count_for_room("r1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_bodies_are_rejected() {
        let (state, _dir) = state().await;
        let (mut conn, _rx) = connection(&state);
        conn.handle(ClientEvent::Room { room: "r1".into() }).await.unwrap();

        let empty = conn.handle(outgoing("r1", "   ", None)).await.unwrap_err();
        assert!(matches!(empty, GatewayError::InvalidRequest(_)));
        let long = conn
            .handle(outgoing("r1", "far too long for this room", None))
            .await
            .unwrap_err();
        assert!(matches!(long, GatewayError::InvalidRequest(_)));
        assert_eq!(state.messages.count_for_room("r1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_room_cannot_be_joined() {
        let (state, _dir) = state().await;
        let (mut conn, _rx) = connection(&state);

        let error = conn
            .handle(ClientEvent::Room { room: "nope".into() })
            .await
            .unwrap_err();
        assert!(matches!(error, GatewayError::NotFound(_)));
        assert!(conn.current_room().is_none());
    }

    #[tokio::test]
    async fn test_switching_rooms_leaves_previous_group() {
        let (state, _dir) = state().await;
        let (mut conn, _rx) = connection(&state);
        let (mut watcher, mut watcher_rx) = connection(&state);
        watcher.handle(ClientEvent::Room { room: "r1".into() }).await.unwrap();

        conn.handle(ClientEvent::Room { room: "r1".into() }).await.unwrap();
        conn.handle(ClientEvent::AddUser {
            user: Sender::new("u1", "Ann"),
            room: "r1".into(),
        })
        .await
        .unwrap();
        assert_eq!(
            next(&mut watcher_rx).await,
            ServerEvent::Presence {
                room: "r1".into(),
                users: vec![Sender::new("u1", "Ann")],
            }
        );

        conn.handle(ClientEvent::Room { room: "r2".into() }).await.unwrap();
        assert_eq!(conn.current_room(), Some("r2"));
        assert!(!state.hub.is_member("r1", conn.id()).await);
        assert!(state.hub.is_member("r2", conn.id()).await);
        assert_eq!(
            next(&mut watcher_rx).await,
            ServerEvent::Presence {
                room: "r1".into(),
                users: vec![],
            }
        );
        // identity carried into the new room
        assert_eq!(state.hub.participants("r2").await, vec![Sender::new("u1", "Ann")]);

        // messages for the old room are now refused
        let error = conn.handle(outgoing("r1", "late", None)).await.unwrap_err();
        assert!(matches!(error, GatewayError::NotJoined(_)));
    }

    #[tokio::test]
    async fn test_broadcast_stays_within_room() {
        let (state, _dir) = state().await;
        let (mut sender, _sender_rx) = connection(&state);
        let (mut other, mut other_rx) = connection(&state);
        sender.handle(ClientEvent::Room { room: "r1".into() }).await.unwrap();
        other.handle(ClientEvent::Room { room: "r2".into() }).await.unwrap();

        sender.handle(outgoing("r1", "hi", None)).await.unwrap();

        assert!(timeout(Duration::from_millis(200), other_rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (state, _dir) = state().await;
        let (mut conn, _rx) = connection(&state);
        conn.handle(ClientEvent::Room { room: "r1".into() }).await.unwrap();

        conn.handle(ClientEvent::LeaveRoom { room: "r1".into() }).await.unwrap();
        conn.release().await;

        assert!(conn.current_room().is_none());
        assert_eq!(state.hub.room_count().await, 0);
    }
}
