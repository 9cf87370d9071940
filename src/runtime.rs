//! Runtime for executing chat turns
//!
//! One actor task owns the session (conversation, live buffer, turn state)
//! and is the only writer. Callers talk to it through `RuntimeHandle`:
//! commands go in over an mpsc channel with a oneshot reply, render state
//! comes out over a `watch` channel, and discrete events over `broadcast`.

mod executor;
mod session;


pub use executor::ChatRuntime;
pub use session::Session;

use crate::conversation::{Message, Snapshot};
use crate::llm::{ChatService, Usage};
use crate::state_machine::{Event, Notice, TransitionError, TurnId};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Errors returned to callers of `RuntimeHandle`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Chat runtime has stopped")]
    Stopped,
}

/// Events sent to subscribers as the session changes
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MessageAppended {
        message: Message,
    },
    TurnStarted {
        turn: TurnId,
        model_id: String,
    },
    Delta {
        text: String,
    },
    TurnCompleted {
        turn: TurnId,
        message: Message,
        usage: Option<Usage>,
    },
    Reset,
    ModelSelected {
        model_id: String,
    },
    CatalogChanged {
        models: Vec<String>,
    },
    Notice {
        notice: Notice,
    },
}

/// Everything a render pass needs, captured between two events.
/// `is_running == false` implies `buffer` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub messages: Snapshot,
    pub buffer: String,
    pub is_running: bool,
    pub running_turn: Option<TurnId>,
    pub selected_model: Option<String>,
    pub models: Vec<String>,
    pub last_notice: Option<Notice>,
}

impl SessionView {
    /// Submission is possible only when idle with a non-empty catalog
    pub fn can_submit(&self) -> bool {
        !self.is_running && !self.models.is_empty()
    }
}

/// Startup parameters for a session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub session_id: String,
    pub models: Vec<String>,
    pub preferred_model: Option<String>,
    /// Sent ahead of the history on every request, never stored
    pub system_prompt: Option<String>,
}

pub(crate) struct Command {
    pub event: Event,
    pub reply: oneshot::Sender<Result<(), TransitionError>>,
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    view_rx: watch::Receiver<SessionView>,
    shutdown: CancellationToken,
}

impl RuntimeHandle {
    /// Append the prompt as a user message and start streaming the reply
    pub async fn submit(
        &self,
        prompt: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        self.send(Event::UserSubmit {
            prompt: prompt.into(),
            model_id: model_id.into(),
        })
        .await
    }

    /// Clear the conversation. Refused while a reply is streaming.
    pub async fn reset(&self) -> Result<(), RuntimeError> {
        self.send(Event::Reset).await
    }

    pub async fn select_model(&self, model_id: impl Into<String>) -> Result<(), RuntimeError> {
        self.send(Event::SelectModel {
            model_id: model_id.into(),
        })
        .await
    }

    pub async fn refresh_catalog(&self, models: Vec<String>) -> Result<(), RuntimeError> {
        self.send(Event::CatalogRefreshed { models }).await
    }

    pub fn is_running(&self) -> bool {
        self.view_rx.borrow().is_running
    }

    /// Latest render state
    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Stop the actor; an in-flight stream is dropped
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn send(&self, event: Event) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command { event, reply })
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        rx.await.map_err(|_| RuntimeError::Stopped)?.map_err(RuntimeError::from)
    }
}

/// Start a session actor on the current tokio runtime
pub fn spawn_session<C>(client: C, options: SessionOptions) -> RuntimeHandle
where
    C: ChatService + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(256);
    let session = Session::new(options);
    let (view_tx, view_rx) = watch::channel(session.view());
    let shutdown = CancellationToken::new();

    let runtime = ChatRuntime::new(
        session,
        Arc::new(client),
        command_rx,
        broadcast_tx.clone(),
        view_tx,
        shutdown.clone(),
    );
    tokio::spawn(runtime.run());

    RuntimeHandle {
        command_tx,
        broadcast_tx,
        view_rx,
        shutdown,
    }
}
