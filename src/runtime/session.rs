//! Session data owned by the runtime actor
//!
//! Applies transition results to the conversation, the live buffer, and the
//! turn state in one synchronous step, so no observer can see a half-applied
//! event.

use super::{SessionEvent, SessionOptions, SessionView};
use crate::catalog::reconcile_selection;
use crate::conversation::{ConversationStore, Role};
use crate::llm::{LlmMessage, LlmRequest, MessageRole};
use crate::state_machine::{
    transition, ChatContext, Effect, Event, Notice, TransitionError, TurnId, TurnState,
};
use crate::stream_buffer::StreamAccumulator;

/// A streaming call the executor must open
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub turn: TurnId,
    pub request: LlmRequest,
}

/// Outcome of one accepted event
#[derive(Debug, Default)]
pub struct Applied {
    pub events: Vec<SessionEvent>,
    pub start: Option<TurnRequest>,
}

pub struct Session {
    context: ChatContext,
    state: TurnState,
    conversation: ConversationStore,
    buffer: StreamAccumulator,
    system_prompt: Option<String>,
    last_notice: Option<Notice>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        let selected = reconcile_selection(&options.models, options.preferred_model.as_deref());
        Self {
            context: ChatContext::new(options.session_id, options.models),
            state: TurnState::Idle,
            conversation: ConversationStore::new(selected),
            buffer: StreamAccumulator::new(),
            system_prompt: options.system_prompt,
            last_notice: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.context.session_id
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    /// Run one event through the state machine and apply its effects
    pub fn handle(&mut self, event: Event) -> Result<Applied, TransitionError> {
        let result = transition(&self.state, &self.context, event)?;
        self.state = result.new_state;

        let mut applied = Applied::default();
        for effect in result.effects {
            self.apply_effect(effect, &mut applied);
        }
        Ok(applied)
    }

    /// Remember a refused user request so the next render can show it
    pub fn record_rejection(&mut self, error: &TransitionError) -> Notice {
        let notice = Notice::rejected(error.to_string());
        self.last_notice = Some(notice.clone());
        notice
    }

    fn apply_effect(&mut self, effect: Effect, applied: &mut Applied) {
        match effect {
            Effect::SelectModel { model_id } => {
                if self.conversation.selected_model_id() != Some(model_id.as_str()) {
                    self.conversation.select_model(Some(model_id.clone()));
                    applied.events.push(SessionEvent::ModelSelected { model_id });
                }
            }

            Effect::AppendUserMessage { content, model_id } => {
                let message = self.conversation.append(Role::User, content, model_id);
                applied.events.push(SessionEvent::MessageAppended { message });
            }

            Effect::StartTurn { turn, model_id } => {
                self.context.last_turn = turn;
                self.last_notice = None;
                applied.start = Some(TurnRequest {
                    turn,
                    request: self.build_request(&model_id),
                });
                applied.events.push(SessionEvent::TurnStarted { turn, model_id });
            }

            Effect::AccumulateDelta { text } => {
                self.buffer.push_delta(&text);
                applied.events.push(SessionEvent::Delta { text });
            }

            Effect::CommitReply {
                turn,
                model_id,
                usage,
            } => {
                let content = self.buffer.flush();
                let message = self.conversation.append(Role::Assistant, content, model_id);
                tracing::debug!(
                    turn = %turn,
                    message_id = message.id,
                    next_id = self.conversation.next_message_id(),
                    chars = message.content.len(),
                    "Reply committed"
                );
                applied.events.push(SessionEvent::TurnCompleted {
                    turn,
                    message,
                    usage,
                });
            }

            Effect::ClearConversation => {
                debug_assert!(self.buffer.is_empty(), "reset with a reply in flight");
                if !self.conversation.is_empty() {
                    tracing::debug!(cleared = self.conversation.len(), "Conversation reset");
                }
                self.conversation.reset();
                self.last_notice = None;
                applied.events.push(SessionEvent::Reset);
            }

            Effect::ReplaceCatalog { models } => {
                let selected =
                    reconcile_selection(&models, self.conversation.selected_model_id());
                self.conversation.select_model(selected);
                self.context.models.clone_from(&models);
                applied.events.push(SessionEvent::CatalogChanged { models });
            }

            Effect::Notify { notice } => {
                self.last_notice = Some(notice.clone());
                applied.events.push(SessionEvent::Notice { notice });
            }
        }
    }

    /// Wire request for the current history: role and content only
    fn build_request(&self, model_id: &str) -> LlmRequest {
        let snapshot = self.conversation.snapshot();
        let mut messages = Vec::with_capacity(snapshot.len() + 1);
        if let Some(system) = &self.system_prompt {
            messages.push(LlmMessage::new(MessageRole::System, system.clone()));
        }
        messages.extend(snapshot.iter().map(|m| {
            let role = match m.role {
                Role::User => MessageRole::User,
                Role::Assistant => MessageRole::Assistant,
                Role::System => MessageRole::System,
            };
            LlmMessage::new(role, m.content.clone())
        }));

        LlmRequest {
            model: model_id.to_string(),
            messages,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            messages: self.conversation.snapshot(),
            buffer: self.buffer.as_str().to_string(),
            is_running: self.state.is_running(),
            running_turn: self.state.current_turn(),
            selected_model: self.conversation.selected_model_id().map(ToString::to_string),
            models: self.context.models.clone(),
            last_notice: self.last_notice.clone(),
        }
    }
}
