use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use parlor_chats::{Room, Sender};
use parlor_client::{Alignment, RoomSession, SessionUpdate};
use parlor_config::{AppConfig, RoomSeed};
use parlor_gateway::create_router;
use parlor_runtime::ChatServices;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    services: ChatServices,
    config: AppConfig,
    _db_dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let db_dir = TempDir::new().expect("create temp dir");
        let db_path = db_dir.path().join("parlor-test.db");

        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", db_path.to_string_lossy());
        config.database.max_connections = 5;
        config.rooms = vec![
            RoomSeed {
                id: "r1".to_string(),
                name: "General".to_string(),
            },
            RoomSeed {
                id: "r2".to_string(),
                name: "Random".to_string(),
            },
        ];
        config.client.reconnect.initial_delay_ms = 10;
        config.client.reconnect.max_delay_ms = 100;

        let services = ChatServices::initialise(&config)
            .await
            .expect("initialise chat services");
        let router = create_router(services.gateway.clone());

        Self {
            router,
            services,
            config,
            _db_dir: db_dir,
        }
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri(uri)
                    .body(Body::empty())
                    .expect("build request"),
            )
            .await
            .expect("dispatch request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect response body")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Serve on an ephemeral port and point the client config at it.
    async fn serve(&mut self) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        self.config.client.base_url = format!("http://{address}");
    }

    fn client(&self, id: &str, name: &str) -> Session {
        parlor_client::connect(&self.config.client, Sender::new(id, name))
    }
}

type Session = RoomSession<parlor_client::HttpHistory, parlor_client::RealtimeChannel>;

/// Drive the session until `done` accepts an update.
async fn until(session: &mut Session, mut done: impl FnMut(&SessionUpdate) -> bool) {
    timeout(Duration::from_secs(5), async {
        loop {
            let update = session.next_update().await.expect("session ended");
            if done(&update) {
                return;
            }
        }
    })
    .await
    .expect("timed out driving session");
}

async fn joined(session: &mut Session, room: Room) {
    let room_id = room.id.clone();
    let user_id = session.user().id.clone();
    session.select_room(Some(room)).expect("select room");

    // History plus our own presence announcement, in whichever order.
    let (mut loaded, mut present) = (false, false);
    until(session, |update| {
        match update {
            SessionUpdate::HistoryLoaded { .. } => loaded = true,
            SessionUpdate::Presence { room, users }
                if *room == room_id && users.iter().any(|user| user.id == user_id) =>
            {
                present = true
            }
            _ => {}
        }
        loaded && present
    })
    .await;
}

#[tokio::test]
async fn seeded_rooms_are_served() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/rooms").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let (status, body) = app.get("/api/message/r1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Array(vec![]));

    let (status, _) = app.get("/api/message/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn two_clients_chat_in_a_room() {
    let mut app = TestApp::new().await;
    app.serve().await;

    let mut ann = app.client("u1", "Ann");
    let mut bob = app.client("u2", "Bob");
    joined(&mut ann, Room::new("r1", "General")).await;
    joined(&mut bob, Room::new("r1", "General")).await;

    ann.send("hi").expect("send");
    assert!(ann.render()[0].pending);

    until(&mut ann, |u| matches!(u, SessionUpdate::Message { .. })).await;
    until(&mut bob, |u| matches!(u, SessionUpdate::Message { .. })).await;

    let mine = ann.render();
    assert_eq!(mine.len(), 1);
    assert!(!mine[0].pending);
    assert_eq!(mine[0].alignment, Alignment::Right);

    let theirs = bob.render();
    assert_eq!(theirs.len(), 1);
    assert_eq!(theirs[0].body, "hi");
    assert_eq!(theirs[0].sender_name, "Ann");
    assert_eq!(theirs[0].alignment, Alignment::Left);

    // Persisted before it was broadcast.
    let stored = app
        .services
        .gateway
        .messages
        .find_by_room("r1", 10)
        .await
        .expect("history");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, mine[0].key);
}

#[tokio::test]
async fn switching_rooms_keeps_a_single_membership() {
    let mut app = TestApp::new().await;
    app.serve().await;

    let mut ann = app.client("u1", "Ann");
    ann.select_room(Some(Room::new("r1", "General"))).expect("select r1");
    joined(&mut ann, Room::new("r2", "Random")).await;

    let hub = &app.services.gateway.hub;
    assert!(hub.participants("r1").await.is_empty());
    assert_eq!(hub.participants("r2").await, vec![Sender::new("u1", "Ann")]);
    assert_eq!(ann.current_room().map(|r| r.id.as_str()), Some("r2"));
}

#[tokio::test]
async fn late_joiner_sees_history_then_live() {
    let mut app = TestApp::new().await;
    app.serve().await;

    let mut ann = app.client("u1", "Ann");
    joined(&mut ann, Room::new("r1", "General")).await;
    for body in ["one", "two"] {
        ann.send(body).expect("send");
        until(&mut ann, |u| matches!(u, SessionUpdate::Message { .. })).await;
    }

    let mut bob = app.client("u2", "Bob");
    joined(&mut bob, Room::new("r1", "General")).await;
    assert_eq!(bob.render().len(), 2);

    ann.send("three").expect("send");
    until(&mut bob, |u| matches!(u, SessionUpdate::Message { .. })).await;

    let bodies: Vec<String> = bob.render().into_iter().map(|row| row.body).collect();
    assert_eq!(bodies, vec!["one", "two", "three"]);
}
