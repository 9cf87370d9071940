//! Conversation history
//!
//! Ordered message log plus the id sequence. Pure data: all mutation goes
//! through the runtime actor, readers get immutable snapshots.


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// First id handed out in a fresh (or reset) conversation
pub const INITIAL_MESSAGE_ID: u64 = 0;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        })
    }
}

/// A committed message. Content never changes after append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
}

/// Immutable view of the history at one point in time
pub type Snapshot = Arc<Vec<Message>>;

/// Message log with id assignment
#[derive(Debug, Clone)]
pub struct ConversationStore {
    messages: Snapshot,
    next_message_id: u64,
    selected_model_id: Option<String>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ConversationStore {
    pub fn new(selected_model_id: Option<String>) -> Self {
        Self {
            messages: Arc::new(Vec::new()),
            next_message_id: INITIAL_MESSAGE_ID,
            selected_model_id,
        }
    }

    /// Append a message, assigning the next id
    pub fn append(&mut self, role: Role, content: impl Into<String>, model_id: impl Into<String>) -> Message {
        let message = Message {
            id: self.next_message_id,
            role,
            content: content.into(),
            model_id: model_id.into(),
            created_at: Utc::now(),
        };
        self.next_message_id += 1;
        // Readers holding an older snapshot keep it; this clones only when shared.
        Arc::make_mut(&mut self.messages).push(message.clone());
        message
    }

    /// Drop all messages and restart the id counter. The selected model survives.
    pub fn reset(&mut self) {
        self.messages = Arc::new(Vec::new());
        self.next_message_id = INITIAL_MESSAGE_ID;
    }

    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.messages)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn next_message_id(&self) -> u64 {
        self.next_message_id
    }

    pub fn selected_model_id(&self) -> Option<&str> {
        self.selected_model_id.as_deref()
    }

    pub fn select_model(&mut self, model_id: Option<String>) {
        self.selected_model_id = model_id;
    }
}
