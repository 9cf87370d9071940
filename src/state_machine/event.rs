//! Events that can occur in a chat session

use super::state::TurnId;
use crate::llm::{LlmError, Usage};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserSubmit {
        prompt: String,
        model_id: String,
    },
    Reset,
    SelectModel {
        model_id: String,
    },
    CatalogRefreshed {
        models: Vec<String>,
    },

    // Stream events, tagged with the turn that produced them
    StreamDelta {
        turn: TurnId,
        text: String,
    },
    StreamCompleted {
        turn: TurnId,
        usage: Usage,
    },
    StreamFailed {
        turn: TurnId,
        error: LlmError,
    },
}

impl Event {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Event::UserSubmit { .. } => "user_submit",
            Event::Reset => "reset",
            Event::SelectModel { .. } => "select_model",
            Event::CatalogRefreshed { .. } => "catalog_refreshed",
            Event::StreamDelta { .. } => "stream_delta",
            Event::StreamCompleted { .. } => "stream_completed",
            Event::StreamFailed { .. } => "stream_failed",
        }
    }
}
