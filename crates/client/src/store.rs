//! Message store accessor: history over HTTP, new messages over the
//! realtime channel.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use parlor_chats::{Message, OutgoingMessage, Sender};
use reqwest::{Client, Url};
use tracing::debug;
use uuid::Uuid;

use crate::channel::Realtime;
use crate::error::{ClientError, ClientResult};

/// Where room history comes from.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Stored messages of a room, oldest first.
    async fn fetch(&self, room_id: &str) -> ClientResult<Vec<Message>>;
}

/// History via `GET {base}/api/message/{room_id}`.
#[derive(Clone)]
pub struct HttpHistory {
    client: Client,
    base_url: String,
}

impl HttpHistory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/api/message/{room_id}`, with `room_id` as one encoded segment.
    fn url(&self, room_id: &str) -> ClientResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Network(format!("invalid base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Network(format!("base url {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "message", room_id]);
        Ok(url)
    }
}

#[async_trait]
impl HistorySource for HttpHistory {
    async fn fetch(&self, room_id: &str) -> ClientResult<Vec<Message>> {
        let url = self.url(room_id)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Network(format!(
                "history request for room {room_id} failed with status {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        let mut messages: Vec<Message> = serde_json::from_str(&body)?;
        for message in messages.iter_mut().filter(|m| m.room_id.is_empty()) {
            message.room_id = room_id.to_string();
        }

        debug!(room_id, count = messages.len(), "fetched room history");
        Ok(messages)
    }
}

/// Reads history from a [`HistorySource`] and writes through a [`Realtime`]
/// channel. Nothing is persisted locally.
pub struct MessageStore<H, R> {
    history: Arc<H>,
    realtime: R,
}

impl<H, R> MessageStore<H, R>
where
    H: HistorySource,
    R: Realtime,
{
    pub fn new(history: H, realtime: R) -> Self {
        Self {
            history: Arc::new(history),
            realtime,
        }
    }

    /// History of `room_id` as a detached future, so the caller can run it
    /// on its own task and abandon it.
    pub fn fetch_history(&self, room_id: &str) -> BoxFuture<'static, ClientResult<Vec<Message>>>
    where
        H: 'static,
    {
        let history = Arc::clone(&self.history);
        let room_id = room_id.to_string();
        async move { history.fetch(&room_id).await }.boxed()
    }

    /// Hand a new message to the channel. Returns the nonce the server will
    /// echo on the broadcast of the stored message.
    pub fn send_message(&self, room_id: &str, sender: &Sender, body: &str) -> ClientResult<String> {
        let nonce = Uuid::new_v4().to_string();

        self.realtime.send(OutgoingMessage {
            room_id: room_id.to_string(),
            sender: sender.id.clone(),
            username: sender.name.clone(),
            message: body.to_string(),
            nonce: Some(nonce.clone()),
        })?;

        Ok(nonce)
    }

    pub fn realtime(&self) -> &R {
        &self.realtime
    }
}
