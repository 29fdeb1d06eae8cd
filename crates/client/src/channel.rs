//! Realtime delivery channel.
//!
//! A background task owns the WebSocket. Handles talk to it through a command
//! queue and observe it through [`ChannelEvent`]s. The task remembers the
//! room membership so it can resubscribe after a reconnect.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parlor_chats::{ClientEvent, Message, OutgoingMessage, Sender, ServerEvent};
use parlor_config::{ClientConfig, ReconnectConfig};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as Frame, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound side of the realtime channel.
pub trait Realtime: Send + Sync {
    /// Join the broadcast group of `room` and announce `user` there.
    fn join(&self, room: &str, user: &Sender) -> ClientResult<()>;

    fn leave(&self, room: &str) -> ClientResult<()>;

    fn send(&self, message: OutgoingMessage) -> ClientResult<()>;
}

/// What the channel task reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Message(Message),
    Presence { room: String, users: Vec<Sender> },
    ServerError(String),
    Disconnected,
    /// Connection restored and the current room resubscribed
    Reconnected,
    /// A queued send was thrown away before reaching the server
    SendDropped { room: String, nonce: String },
    /// Gave up reconnecting, or the channel was shut down
    Closed,
}

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub url: String,
    pub outbound_buffer: usize,
    pub reconnect: ReconnectConfig,
}

impl From<&ClientConfig> for ChannelSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            url: config.websocket_url(),
            outbound_buffer: config.outbound_buffer,
            reconnect: config.reconnect.clone(),
        }
    }
}

#[derive(Debug)]
enum Command {
    Join { room: String, user: Sender },
    Leave { room: String },
    Send(OutgoingMessage),
    Shutdown,
}

/// Cloneable handle to the channel task. The task stops once every handle
/// is dropped or [`RealtimeChannel::close`] is called.
#[derive(Clone)]
pub struct RealtimeChannel {
    commands: mpsc::UnboundedSender<Command>,
}

impl RealtimeChannel {
    /// Spawn the channel task. Must be called inside a tokio runtime.
    pub fn connect(settings: ChannelSettings) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();

        tokio::spawn(run_channel(settings, command_rx, event_tx));

        (Self { commands }, events)
    }

    pub fn close(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    fn submit(&self, command: Command) -> ClientResult<()> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::ChannelClosed)
    }
}

impl Realtime for RealtimeChannel {
    fn join(&self, room: &str, user: &Sender) -> ClientResult<()> {
        self.submit(Command::Join {
            room: room.to_string(),
            user: user.clone(),
        })
    }

    fn leave(&self, room: &str) -> ClientResult<()> {
        self.submit(Command::Leave {
            room: room.to_string(),
        })
    }

    fn send(&self, message: OutgoingMessage) -> ClientResult<()> {
        self.submit(Command::Send(message))
    }
}

/// Membership and offline queue, independent of the socket.
#[derive(Debug)]
struct ChannelState {
    membership: Option<(String, Sender)>,
    outbox: VecDeque<OutgoingMessage>,
    capacity: usize,
    dropped: Vec<OutgoingMessage>,
}

impl ChannelState {
    fn new(capacity: usize) -> Self {
        Self {
            membership: None,
            outbox: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: Vec::new(),
        }
    }

    /// Record a command and return the frames to write now. Offline sends
    /// are queued instead.
    fn apply(&mut self, command: Command, online: bool) -> Vec<ClientEvent> {
        match command {
            Command::Join { room, user } => {
                self.membership = Some((room.clone(), user.clone()));
                if online {
                    join_frames(room, user)
                } else {
                    Vec::new()
                }
            }
            Command::Leave { room } => {
                if self.membership.as_ref().is_some_and(|(current, _)| *current == room) {
                    self.membership = None;
                }
                if online {
                    vec![ClientEvent::LeaveRoom { room }]
                } else {
                    Vec::new()
                }
            }
            Command::Send(message) => {
                if online {
                    vec![ClientEvent::SendMessage(message)]
                } else {
                    self.enqueue(message);
                    Vec::new()
                }
            }
            Command::Shutdown => Vec::new(),
        }
    }

    fn enqueue(&mut self, message: OutgoingMessage) {
        if self.outbox.len() >= self.capacity {
            if let Some(oldest) = self.outbox.pop_front() {
                warn!(room = %oldest.room_id, "outbound buffer full, dropping oldest queued message");
                self.dropped.push(oldest);
            }
        }
        self.outbox.push_back(message);
    }

    /// A write failed; keep the message for the next connection.
    fn requeue(&mut self, frame: ClientEvent) {
        if let ClientEvent::SendMessage(message) = frame {
            if self.outbox.len() >= self.capacity {
                if let Some(newest) = self.outbox.pop_back() {
                    warn!(room = %newest.room_id, "outbound buffer full, dropping newest queued message");
                    self.dropped.push(newest);
                }
            }
            self.outbox.push_front(message);
        }
    }

    fn requeue_back(&mut self, frame: ClientEvent) {
        if let ClientEvent::SendMessage(message) = frame {
            self.enqueue(message);
        }
    }

    /// Frames for a fresh connection: resubscribe, then flush the queue.
    /// Queued messages for a room that is no longer current are dropped.
    fn on_connect(&mut self) -> Vec<ClientEvent> {
        let mut frames = Vec::new();
        let current_room = self.membership.as_ref().map(|(room, _)| room.clone());

        if let Some((room, user)) = self.membership.clone() {
            frames.extend(join_frames(room, user));
        }

        for message in self.outbox.drain(..) {
            if current_room.as_deref() == Some(message.room_id.as_str()) {
                frames.push(ClientEvent::SendMessage(message));
            } else {
                warn!(room = %message.room_id, "discarding queued message for a room no longer joined");
                self.dropped.push(message);
            }
        }
        frames
    }

    /// Report messages dropped since the last call. Only sends that carry a
    /// nonce can be matched by the owner.
    fn report_dropped(&mut self, events: &mpsc::UnboundedSender<ChannelEvent>) {
        for message in self.dropped.drain(..) {
            if let Some(nonce) = message.nonce {
                let _ = events.send(ChannelEvent::SendDropped {
                    room: message.room_id,
                    nonce,
                });
            }
        }
    }
}

fn join_frames(room: String, user: Sender) -> Vec<ClientEvent> {
    vec![
        ClientEvent::Room { room: room.clone() },
        ClientEvent::AddUser { user, room },
    ]
}

/// Delay before reconnect attempt `attempt` (1-based): the initial delay
/// doubled per attempt, capped at the maximum.
pub fn backoff_delay(reconnect: &ReconnectConfig, attempt: u32) -> Duration {
    let initial = reconnect.initial_delay_ms.max(1);
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    let delay = initial.saturating_mul(factor).min(reconnect.max_delay_ms.max(initial));
    Duration::from_millis(delay)
}

fn with_jitter(delay: Duration) -> Duration {
    let spread = (delay.as_millis() as u64 / 10).max(1);
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..spread))
}

enum PumpExit {
    Lost,
    Shutdown,
}

async fn run_channel(
    settings: ChannelSettings,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let mut state = ChannelState::new(settings.outbound_buffer);
    let mut connected_once = false;
    let mut attempt: u32 = 0;

    loop {
        match connect_async(settings.url.as_str()).await {
            Ok((mut socket, _)) => {
                attempt = 0;
                let frames = state.on_connect();
                let written = write_frames(&mut socket, frames, &mut state).await;
                state.report_dropped(&events);
                let outcome = match written {
                    Ok(()) => {
                        let event = if connected_once {
                            ChannelEvent::Reconnected
                        } else {
                            ChannelEvent::Connected
                        };
                        info!(url = %settings.url, ?event, "realtime channel connected");
                        connected_once = true;
                        let _ = events.send(event);
                        pump(&mut socket, &mut commands, &events, &mut state).await
                    }
                    Err(()) => PumpExit::Lost,
                };

                state.report_dropped(&events);
                match outcome {
                    PumpExit::Shutdown => {
                        let _ = socket.close(None).await;
                        let _ = events.send(ChannelEvent::Closed);
                        return;
                    }
                    PumpExit::Lost => {
                        warn!(url = %settings.url, "realtime connection lost");
                        if connected_once {
                            let _ = events.send(ChannelEvent::Disconnected);
                        }
                    }
                }
            }
            Err(error) => {
                debug!(url = %settings.url, %error, "realtime connect failed");
            }
        }

        attempt += 1;
        if settings
            .reconnect
            .max_attempts
            .is_some_and(|max| attempt > max)
        {
            warn!(attempts = attempt - 1, "giving up on realtime channel");
            let _ = events.send(ChannelEvent::Closed);
            return;
        }

        let delay = with_jitter(backoff_delay(&settings.reconnect, attempt));
        debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting realtime channel");
        if !wait_offline(delay, &mut commands, &mut state, &events).await {
            let _ = events.send(ChannelEvent::Closed);
            return;
        }
    }
}

/// Sleep out the backoff while still accepting commands. Returns false on
/// shutdown.
async fn wait_offline(
    delay: Duration,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    state: &mut ChannelState,
    events: &mpsc::UnboundedSender<ChannelEvent>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            command = commands.recv() => match command {
                None | Some(Command::Shutdown) => return false,
                Some(command) => {
                    state.apply(command, false);
                    state.report_dropped(events);
                }
            },
        }
    }
}

async fn pump(
    socket: &mut Socket,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    state: &mut ChannelState,
) -> PumpExit {
    loop {
        tokio::select! {
            frame = socket.next() => match frame {
                Some(Ok(Frame::Text(text))) => dispatch(&text, events),
                Some(Ok(Frame::Close(_))) | None => return PumpExit::Lost,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    debug!(%error, "realtime read failed");
                    return PumpExit::Lost;
                }
            },
            command = commands.recv() => match command {
                None | Some(Command::Shutdown) => return PumpExit::Shutdown,
                Some(command) => {
                    let frames = state.apply(command, true);
                    if write_frames(socket, frames, state).await.is_err() {
                        return PumpExit::Lost;
                    }
                }
            },
        }
    }
}

async fn write_frames(
    socket: &mut Socket,
    frames: Vec<ClientEvent>,
    state: &mut ChannelState,
) -> Result<(), ()> {
    let mut frames = frames.into_iter();
    while let Some(frame) = frames.next() {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "failed to encode client event");
                continue;
            }
        };

        if let Err(error) = socket.send(Frame::Text(text)).await {
            debug!(%error, "realtime write failed");
            state.requeue(frame);
            for rest in frames {
                state.requeue_back(rest);
            }
            return Err(());
        }
    }
    Ok(())
}

fn dispatch(text: &str, events: &mpsc::UnboundedSender<ChannelEvent>) {
    let event = match serde_json::from_str::<ServerEvent>(text) {
        Ok(ServerEvent::ReceiveMessage { message }) => ChannelEvent::Message(message),
        Ok(ServerEvent::Presence { room, users }) => ChannelEvent::Presence { room, users },
        Ok(ServerEvent::Error { message }) => ChannelEvent::ServerError(message),
        Err(error) => {
            warn!(%error, "ignoring undecodable server frame");
            return;
        }
    };
    let _ = events.send(event);
}
