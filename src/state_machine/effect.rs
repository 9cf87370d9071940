//! Effects produced by state transitions

use super::state::{Notice, TurnId};
use crate::llm::Usage;

/// Effects to be applied, in order, after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Record the selected model
    SelectModel { model_id: String },

    /// Append the user's prompt to the conversation
    AppendUserMessage { content: String, model_id: String },

    /// Open the streaming chat call for a new turn
    StartTurn { turn: TurnId, model_id: String },

    /// Append a delta to the live buffer
    AccumulateDelta { text: String },

    /// Flush the buffer and append it as the assistant reply
    CommitReply {
        turn: TurnId,
        model_id: String,
        usage: Option<Usage>,
    },

    /// Empty the conversation and restart ids
    ClearConversation,

    /// Replace the model catalog
    ReplaceCatalog { models: Vec<String> },

    /// Surface a recoverable notice to the UI
    Notify { notice: Notice },
}

impl Effect {
    pub fn append_user_message(content: impl Into<String>, model_id: impl Into<String>) -> Self {
        Effect::AppendUserMessage {
            content: content.into(),
            model_id: model_id.into(),
        }
    }

    pub fn commit_reply(turn: TurnId, model_id: impl Into<String>, usage: Option<Usage>) -> Self {
        Effect::CommitReply {
            turn,
            model_id: model_id.into(),
            usage,
        }
    }

    pub fn notify(notice: Notice) -> Self {
        Effect::Notify { notice }
    }
}
