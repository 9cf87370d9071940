//! Turn state types

use crate::llm::LlmError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence number of a chat turn within a session (first turn is 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl TurnId {
    pub fn next(self) -> Self {
        TurnId(self.0 + 1)
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task status of the session. At most one turn runs at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// Ready for user input
    #[default]
    Idle,

    /// Chat stream in flight for `turn`
    Running { turn: TurnId, model_id: String },
}

impl TurnState {
    pub fn is_running(&self) -> bool {
        matches!(self, TurnState::Running { .. })
    }

    pub fn current_turn(&self) -> Option<TurnId> {
        match self {
            TurnState::Running { turn, .. } => Some(*turn),
            TurnState::Idle => None,
        }
    }
}

/// Session configuration that the transition function reads
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub session_id: String,
    /// Models the server reported; empty disables submission
    pub models: Vec<String>,
    /// Highest turn id handed out so far
    pub last_turn: TurnId,
}

impl ChatContext {
    pub fn new(session_id: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            session_id: session_id.into(),
            models,
            last_turn: TurnId(0),
        }
    }

    pub fn has_model(&self, model_id: &str) -> bool {
        self.models.iter().any(|m| m == model_id)
    }
}

/// Kind of user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// The stream broke; the partial reply was kept
    TurnFailed,
    /// A request was refused and nothing changed
    Rejected,
}

/// Recoverable condition shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub turn: Option<TurnId>,
    pub message: String,
}

impl Notice {
    pub fn turn_failed(turn: TurnId, error: &LlmError) -> Self {
        Self {
            kind: NoticeKind::TurnFailed,
            turn: Some(turn),
            message: format!("Reply interrupted ({}): {}", error.kind.as_str(), error.message),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Rejected,
            turn: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.turn {
            Some(turn) => write!(f, "[turn {turn}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}
