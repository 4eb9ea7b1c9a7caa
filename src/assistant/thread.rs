//! Conversation thread store — the gateway's local image of service-owned
//! state.
//!
//! The hosted assistant service owns the conversation; the gateway keeps an
//! ordered per-channel copy so the chat surface can derive its view from
//! thread contents without any duplicated "which view am I in" flag.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Who authored a thread entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry in a conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub role: Role,
    pub content: String,
}

impl ThreadMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Per-channel append-only threads behind one short-lived lock.
///
/// No persistence: threads live and die with the process, matching the
/// service-owned model where the gateway is only a viewer.
#[derive(Debug, Default)]
pub struct ThreadStore {
    threads: Mutex<HashMap<String, Vec<ThreadMessage>>>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a channel's thread.
    pub fn append(&self, channel_id: &str, message: ThreadMessage) {
        let mut threads = self.threads.lock().expect("thread store poisoned");
        threads.entry(channel_id.to_string()).or_default().push(message);
    }

    /// Ordered copy of a channel's thread. Empty for unknown channels.
    pub fn snapshot(&self, channel_id: &str) -> Vec<ThreadMessage> {
        let threads = self.threads.lock().expect("thread store poisoned");
        threads.get(channel_id).cloned().unwrap_or_default()
    }

    /// Number of messages in a channel's thread.
    pub fn len(&self, channel_id: &str) -> usize {
        let threads = self.threads.lock().expect("thread store poisoned");
        threads.get(channel_id).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self, channel_id: &str) -> bool {
        self.len(channel_id) == 0
    }
}
