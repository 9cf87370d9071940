//! Pure state transition function

use super::state::Notice;
use super::{ChatContext, Effect, Event, TurnId, TurnState};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Reasons a transition is refused. A refused event leaves the session untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A reply is still streaming; wait for it to finish")]
    AlreadyRunning,
    #[error("Cannot start over while a reply is streaming")]
    ResetWhileRunning,
    #[error("Cannot change model while a reply is streaming")]
    ModelChangeWhileRunning,
    #[error("No models available on the server")]
    NoModelsAvailable,
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Stream event for turn {got} does not match the running turn ({expected:?})")]
    StaleTurn {
        expected: Option<TurnId>,
        got: TurnId,
    },
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    state: &TurnState,
    context: &ChatContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User submission
        // ============================================================
        (TurnState::Idle, Event::UserSubmit { prompt, model_id }) => {
            check_model(context, &model_id)?;
            let turn = context.last_turn.next();
            Ok(TransitionResult::new(TurnState::Running {
                turn,
                model_id: model_id.clone(),
            })
            .with_effect(Effect::SelectModel {
                model_id: model_id.clone(),
            })
            .with_effect(Effect::append_user_message(prompt, model_id.clone()))
            .with_effect(Effect::StartTurn { turn, model_id }))
        }

        // Rejected, not queued: the caller sees the failure
        (TurnState::Running { .. }, Event::UserSubmit { .. }) => Err(TransitionError::AlreadyRunning),

        // ============================================================
        // Session controls
        // ============================================================
        (TurnState::Idle, Event::Reset) => {
            Ok(TransitionResult::new(TurnState::Idle).with_effect(Effect::ClearConversation))
        }

        (TurnState::Running { .. }, Event::Reset) => Err(TransitionError::ResetWhileRunning),

        (TurnState::Idle, Event::SelectModel { model_id }) => {
            check_model(context, &model_id)?;
            Ok(TransitionResult::new(TurnState::Idle).with_effect(Effect::SelectModel { model_id }))
        }

        (TurnState::Running { .. }, Event::SelectModel { .. }) => {
            Err(TransitionError::ModelChangeWhileRunning)
        }

        // The running turn keeps its model even if it disappears from the list
        (state, Event::CatalogRefreshed { models }) => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::ReplaceCatalog { models }))
        }

        // ============================================================
        // Stream progress
        // ============================================================
        (TurnState::Running { turn, .. }, Event::StreamDelta { turn: got, text }) if *turn == got => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::AccumulateDelta { text }))
        }

        (TurnState::Running { turn, model_id }, Event::StreamCompleted { turn: got, usage })
            if *turn == got =>
        {
            Ok(TransitionResult::new(TurnState::Idle)
                .with_effect(Effect::commit_reply(*turn, model_id.clone(), Some(usage))))
        }

        // A failed turn still commits whatever arrived and returns to Idle
        (TurnState::Running { turn, model_id }, Event::StreamFailed { turn: got, error })
            if *turn == got =>
        {
            Ok(TransitionResult::new(TurnState::Idle)
                .with_effect(Effect::commit_reply(*turn, model_id.clone(), None))
                .with_effect(Effect::notify(Notice::turn_failed(*turn, &error))))
        }

        (
            state,
            Event::StreamDelta { turn: got, .. }
            | Event::StreamCompleted { turn: got, .. }
            | Event::StreamFailed { turn: got, .. },
        ) => Err(TransitionError::StaleTurn {
            expected: state.current_turn(),
            got,
        }),
    }
}

fn check_model(context: &ChatContext, model_id: &str) -> Result<(), TransitionError> {
    if context.models.is_empty() {
        return Err(TransitionError::NoModelsAvailable);
    }
    if !context.has_model(model_id) {
        return Err(TransitionError::UnknownModel(model_id.to_string()));
    }
    Ok(())
}
