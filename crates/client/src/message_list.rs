//! Ordered, render-ready message list of the current room.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parlor_chats::{Message, Sender};

/// Which side of the view a message bubble sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Messages from other participants
    Left,
    /// Messages from the current user
    Right,
}

/// What `push_live` did with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    Appended,
    /// Replaced the optimistic entry carrying the same nonce
    Confirmed,
    /// Already present; ignored
    Duplicate,
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Confirmed(Message),
    Pending {
        nonce: String,
        sender: Sender,
        body: String,
        created_at: DateTime<Utc>,
    },
}

impl Entry {
    fn confirmed_id(&self) -> Option<&str> {
        match self {
            Entry::Confirmed(message) => Some(&message.id),
            Entry::Pending { .. } => None,
        }
    }

    fn has_nonce(&self, wanted: &str) -> bool {
        matches!(self, Entry::Pending { nonce, .. } if nonce == wanted)
    }
}

/// One row of the rendered list.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    /// Server id, or the client nonce for a pending entry
    pub key: String,
    pub sender_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub alignment: Alignment,
    pub pending: bool,
}

/// Messages in arrival order: history first, then live deliveries and
/// optimistic local entries.
#[derive(Debug, Default)]
pub struct MessageList {
    entries: Vec<Entry>,
    /// Set once history has been loaded since the last clear
    has_history: bool,
    scroll_requested: bool,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load freshly fetched history.
    ///
    /// The first load after a clear puts `history` in front. Live messages
    /// that arrived while the fetch was in flight, and are not part of
    /// `history`, follow in their arrival order, then pending entries.
    ///
    /// Later loads (a refetch after reconnecting) only fill gaps. `history`
    /// may be a window over the newest messages, so nothing already listed
    /// moves; each missing message goes right after its predecessor in
    /// `history`, or before its successor when it has none.
    pub fn load_history(&mut self, history: Vec<Message>) {
        let mut seen = HashSet::new();
        let history: Vec<Message> = history
            .into_iter()
            .filter(|message| seen.insert(message.id.clone()))
            .collect();

        let entries = if self.has_history {
            self.merged_with(history)
        } else {
            self.prefixed_with(history, seen)
        };
        self.has_history = true;
        self.replace(entries);
    }

    fn prefixed_with(&mut self, history: Vec<Message>, mut seen: HashSet<String>) -> Vec<Entry> {
        let mut entries: Vec<Entry> = history.into_iter().map(Entry::Confirmed).collect();

        let (confirmed, pending): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.confirmed_id().is_some());

        for entry in confirmed {
            if let Some(id) = entry.confirmed_id() {
                if seen.insert(id.to_string()) {
                    entries.push(entry);
                }
            }
        }
        entries.extend(pending);
        entries
    }

    fn merged_with(&self, history: Vec<Message>) -> Vec<Entry> {
        let mut entries = self.entries.clone();

        for (index, message) in history.iter().enumerate() {
            if position_of(&entries, &message.id).is_some() {
                continue;
            }

            let after_previous = index
                .checked_sub(1)
                .and_then(|previous| position_of(&entries, &history[previous].id))
                .map(|at| at + 1);
            let before_next = || {
                history[index + 1..]
                    .iter()
                    .find_map(|next| position_of(&entries, &next.id))
            };
            let first_pending = || {
                entries
                    .iter()
                    .position(|entry| entry.confirmed_id().is_none())
                    .unwrap_or(entries.len())
            };

            let at = after_previous
                .or_else(before_next)
                .unwrap_or_else(first_pending);
            entries.insert(at, Entry::Confirmed(message.clone()));
        }
        entries
    }

    /// Append a message delivered over the realtime channel.
    pub fn push_live(&mut self, message: Message) -> LiveOutcome {
        let nonce_slot = message
            .nonce
            .as_deref()
            .and_then(|nonce| self.entries.iter().position(|entry| entry.has_nonce(nonce)));

        if self.contains(&message.id) {
            // History beat the echo; the optimistic copy is now redundant.
            if let Some(index) = nonce_slot {
                self.entries.remove(index);
                self.scroll_requested = true;
            }
            return LiveOutcome::Duplicate;
        }

        self.scroll_requested = true;
        match nonce_slot {
            Some(index) => {
                self.entries[index] = Entry::Confirmed(message);
                LiveOutcome::Confirmed
            }
            None => {
                self.entries.push(Entry::Confirmed(message));
                LiveOutcome::Appended
            }
        }
    }

    /// Remove the pending entry for `nonce`, as when its send was dropped.
    pub fn discard_pending(&mut self, nonce: &str) -> bool {
        match self.entries.iter().position(|entry| entry.has_nonce(nonce)) {
            Some(index) => {
                self.entries.remove(index);
                self.scroll_requested = true;
                true
            }
            None => false,
        }
    }

    /// Insert an optimistic local entry for a message still on its way.
    pub fn push_pending(&mut self, nonce: impl Into<String>, sender: Sender, body: impl Into<String>) {
        self.entries.push(Entry::Pending {
            nonce: nonce.into(),
            sender,
            body: body.into(),
            created_at: Utc::now(),
        });
        self.scroll_requested = true;
    }

    pub fn render(&self, current_user_id: &str) -> Vec<RenderedMessage> {
        self.entries
            .iter()
            .map(|entry| match entry {
                Entry::Confirmed(message) => RenderedMessage {
                    key: message.id.clone(),
                    sender_name: message.sender.name.clone(),
                    body: message.body.clone(),
                    created_at: message.created_at,
                    alignment: align(message.is_from(current_user_id)),
                    pending: false,
                },
                Entry::Pending {
                    nonce,
                    sender,
                    body,
                    created_at,
                } => RenderedMessage {
                    key: nonce.clone(),
                    sender_name: sender.name.clone(),
                    body: body.clone(),
                    created_at: *created_at,
                    alignment: align(sender.id == current_user_id),
                    pending: true,
                },
            })
            .collect()
    }

    /// True once after any change to the sequence.
    pub fn take_autoscroll(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    /// Drop everything, as on a room switch. Does not request a scroll.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.has_history = false;
        self.scroll_requested = false;
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.confirmed_id() == Some(message_id))
    }

    /// Confirmed messages in list order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Confirmed(message) => Some(message),
            Entry::Pending { .. } => None,
        })
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, Entry::Pending { .. }))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn replace(&mut self, entries: Vec<Entry>) {
        if entries != self.entries {
            self.scroll_requested = true;
        }
        self.entries = entries;
    }
}

fn position_of(entries: &[Entry], message_id: &str) -> Option<usize> {
    entries
        .iter()
        .position(|entry| entry.confirmed_id() == Some(message_id))
}

fn align(own: bool) -> Alignment {
    if own {
        Alignment::Right
    } else {
        Alignment::Left
    }
}
