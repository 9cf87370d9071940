//! Chat runtime executor

use super::session::{Session, TurnRequest};
use super::{Command, SessionEvent, SessionView};
use crate::llm::{ChatService, LlmError, LlmRequest};
use crate::state_machine::{Event, TransitionError, TurnId};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Actor that owns a chat session and drives its streaming turns
pub struct ChatRuntime<C>
where
    C: ChatService + 'static,
{
    session: Session,
    client: Arc<C>,
    command_rx: mpsc::Receiver<Command>,
    /// Stream progress from the in-flight turn
    stream_rx: mpsc::Receiver<Event>,
    stream_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    view_tx: watch::Sender<SessionView>,
    /// Parent of every stream task's token
    shutdown: CancellationToken,
}

impl<C> ChatRuntime<C>
where
    C: ChatService + 'static,
{
    pub(crate) fn new(
        session: Session,
        client: Arc<C>,
        command_rx: mpsc::Receiver<Command>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
        view_tx: watch::Sender<SessionView>,
        shutdown: CancellationToken,
    ) -> Self {
        let (stream_tx, stream_rx) = mpsc::channel(64);
        Self {
            session,
            client,
            command_rx,
            stream_rx,
            stream_tx,
            broadcast_tx,
            view_tx,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session.session_id(), "Starting chat runtime");

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                Some(event) = self.stream_rx.recv() => {
                    if let Err(e) = self.handle_event(event) {
                        // Late events from an abandoned stream land here
                        tracing::debug!(error = %e, "Dropping stream event");
                    }
                }
                command = self.command_rx.recv() => {
                    let Some(Command { event, reply }) = command else { break };
                    let kind = event.kind();
                    let result = self.handle_event(event);
                    if let Err(e) = &result {
                        tracing::info!(event = kind, state = ?self.session.state(), error = %e, "Request rejected");
                        self.reject(e);
                    }
                    let _ = reply.send(result);
                }
            }
        }

        // Handles dropped or shutdown requested: stop any stream still in flight
        self.shutdown.cancel();
        tracing::info!(session_id = %self.session.session_id(), "Chat runtime stopped");
    }

    fn handle_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let applied = self.session.handle(event)?;

        self.view_tx.send_replace(self.session.view());
        for event in applied.events {
            let _ = self.broadcast_tx.send(event);
        }

        if let Some(start) = applied.start {
            self.start_stream(start);
        }
        Ok(())
    }

    fn reject(&mut self, error: &TransitionError) {
        if matches!(error, TransitionError::StaleTurn { .. }) {
            return;
        }
        let notice = self.session.record_rejection(error);
        self.view_tx.send_replace(self.session.view());
        let _ = self.broadcast_tx.send(SessionEvent::Notice { notice });
    }

    fn start_stream(&mut self, start: TurnRequest) {
        let TurnRequest { turn, request } = start;
        tracing::info!(
            session_id = %self.session.session_id(),
            turn = %turn,
            model = %request.model,
            messages = request.messages.len(),
            "Starting chat stream"
        );

        let token = self.shutdown.child_token();
        let client = self.client.clone();
        let tx = self.stream_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::info!(turn = %turn, "Chat stream cancelled");
                }
                () = stream_turn(client.as_ref(), turn, &request, &tx) => {}
            }
        });
    }
}

/// Drive one streaming call, reporting progress as state machine events.
/// Exactly one terminal event (completed or failed) is sent per turn.
async fn stream_turn<C: ChatService + ?Sized>(
    client: &C,
    turn: TurnId,
    request: &LlmRequest,
    tx: &mpsc::Sender<Event>,
) {
    let terminal = match client.stream_chat(request).await {
        Err(error) => Event::StreamFailed { turn, error },
        Ok(mut chunks) => loop {
            match chunks.next().await {
                Some(Ok(chunk)) => {
                    if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                        if tx.send(Event::StreamDelta { turn, text }).await.is_err() {
                            return;
                        }
                    }
                    if chunk.done {
                        break Event::StreamCompleted {
                            turn,
                            usage: chunk.usage.unwrap_or_default(),
                        };
                    }
                }
                Some(Err(error)) => break Event::StreamFailed { turn, error },
                None => {
                    break Event::StreamFailed {
                        turn,
                        error: LlmError::protocol(
                            "Stream ended before the server signalled completion",
                        ),
                    }
                }
            }
        },
    };

    if let Event::StreamFailed { error, .. } = &terminal {
        tracing::warn!(turn = %turn, kind = error.kind.as_str(), error = %error.message, "Chat stream failed");
    }
    let _ = tx.send(terminal).await;
}
