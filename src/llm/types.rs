//! Common types for model server interactions

use super::LlmError;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Streaming chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<LlmMessage>,
}

/// Message as sent upstream: role and content only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: String,
}

impl LlmMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Message role on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One decoded piece of a streaming reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatChunk {
    /// Incremental text; `None` is a no-op delta
    pub content: Option<String>,
    /// Set on the final chunk of a reply
    pub done: bool,
    /// Only present on the final chunk
    pub usage: Option<Usage>,
}

impl ChatChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn done(usage: Usage) -> Self {
        Self {
            content: None,
            done: true,
            usage: Some(usage),
        }
    }
}

/// Completion statistics reported with the final chunk
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_duration: Option<Duration>,
    pub done_reason: Option<String>,
}

/// Lazy, finite, non-restartable sequence of chunks for one turn.
/// `None` from the stream is end-of-transport; a clean reply ends with a
/// chunk whose `done` flag is set.
pub type ChunkStream = BoxStream<'static, Result<ChatChunk, LlmError>>;
