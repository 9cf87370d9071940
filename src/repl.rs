//! Line-oriented terminal front-end
//!
//! Reads prompts and slash commands from stdin and prints the session as it
//! changes. Rendering only reads the runtime's published state and events.

use crate::catalog::ModelCatalog;
use crate::conversation::{Message, Role};
use crate::runtime::{RuntimeError, RuntimeHandle, SessionEvent};
use crate::state_machine::{NoticeKind, TurnId};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const HELP: &str = "\
Type a message and press Enter to send it.
  /reset          start over
  /model <name>   switch model
  /models         re-fetch the model list
  /history        show the conversation
  /help           show this help
  /quit           exit";

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Prompt(String),
    Reset,
    Model(String),
    Models,
    History,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Prompt(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name, arg) {
            ("reset", "") => Self::Reset,
            ("model", model) if !model.is_empty() => Self::Model(model.to_string()),
            ("models", "") => Self::Models,
            ("history", "") => Self::History,
            ("help", "") => Self::Help,
            ("quit" | "exit", "") => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }

    /// Commands that would change the session
    fn mutates(&self) -> bool {
        matches!(self, Self::Prompt(_) | Self::Reset | Self::Model(_) | Self::Models)
    }
}

/// Transcript line for a stored message. System messages are not shown.
pub fn render_message(message: &Message) -> Option<String> {
    match message.role {
        Role::User => Some(format!("[{}] You: {}", message.model_id, message.content)),
        Role::Assistant => Some(format!("Assistant: {}", message.content)),
        Role::System => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Forward stdin lines from a plain OS thread. A blocking read there never
/// holds up runtime shutdown; the thread ends with the process.
pub fn spawn_stdin_reader() -> io::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

pub struct Repl<W: Write> {
    handle: RuntimeHandle,
    catalog: Arc<dyn ModelCatalog>,
    out: W,
    /// Turn whose reply is being printed
    reply: Option<TurnId>,
    /// Bytes of that reply already on screen
    printed: usize,
    /// Last turn whose reply was fully printed
    finished: Option<TurnId>,
}

impl<W: Write> Repl<W> {
    pub fn new(handle: RuntimeHandle, catalog: Arc<dyn ModelCatalog>, out: W) -> Self {
        Self {
            handle,
            catalog,
            out,
            reply: None,
            printed: 0,
            finished: None,
        }
    }

    /// Run until `/quit`, end of input, cancellation, or the runtime stopping
    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<String>,
        shutdown: CancellationToken,
    ) -> io::Result<()> {
        let mut events = self.handle.subscribe();
        let mut view = self.handle.watch();

        self.print_banner()?;
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => self.render_event(&event)?,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Renderer fell behind session events");
                        self.resync()?;
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = view.changed() => {
                    if changed.is_err() {
                        tracing::info!("Chat runtime stopped; leaving");
                        break;
                    }
                }
                line = input.recv() => {
                    let Some(line) = line else { break };
                    if self.execute(ReplCommand::parse(&line)).await? == Flow::Quit {
                        break;
                    }
                }
            }
        }

        writeln!(self.out)?;
        self.out.flush()
    }

    fn print_banner(&mut self) -> io::Result<()> {
        let view = self.handle.view();
        match &view.selected_model {
            Some(model) if view.can_submit() => writeln!(self.out, "Chatting with {model}. /help for commands.")?,
            _ => writeln!(self.out, "No models available on the server; use /models to re-check.")?,
        }
        self.out.flush()
    }

    async fn execute(&mut self, command: ReplCommand) -> io::Result<Flow> {
        if command.mutates() && self.handle.is_running() {
            writeln!(self.out, "! A reply is still streaming; input ignored")?;
            return Ok(Flow::Continue);
        }

        match command {
            ReplCommand::Empty => {}
            ReplCommand::Prompt(prompt) => {
                let Some(model) = self.handle.view().selected_model else {
                    writeln!(self.out, "! No model selected")?;
                    return Ok(Flow::Continue);
                };
                let result = self.handle.submit(prompt, model).await;
                self.report(result)?;
            }
            ReplCommand::Reset => {
                let result = self.handle.reset().await;
                if self.report(result)? {
                    writeln!(self.out, "Conversation cleared.")?;
                }
            }
            ReplCommand::Model(model) => {
                let result = self.handle.select_model(model).await;
                self.report(result)?;
            }
            ReplCommand::Models => match self.catalog.list_models().await {
                Ok(models) => {
                    let result = self.handle.refresh_catalog(models).await;
                    self.report(result)?;
                }
                Err(e) => writeln!(self.out, "! Could not list models: {}", e.message)?,
            },
            ReplCommand::History => {
                let view = self.handle.view();
                for line in view.messages.iter().filter_map(render_message) {
                    writeln!(self.out, "{line}")?;
                }
                if let Some(turn) = view.running_turn {
                    writeln!(self.out, "Assistant: {}… (turn {turn} streaming)", view.buffer)?;
                }
                if let Some(notice) = &view.last_notice {
                    writeln!(self.out, "! {notice}")?;
                }
            }
            ReplCommand::Help => writeln!(self.out, "{HELP}")?,
            ReplCommand::Quit => return Ok(Flow::Quit),
            ReplCommand::Unknown(line) => writeln!(self.out, "! Unknown command: {line} (try /help)")?,
        }
        self.out.flush()?;
        Ok(Flow::Continue)
    }

    /// Print a refusal; returns whether the request went through
    fn report(&mut self, result: Result<(), RuntimeError>) -> io::Result<bool> {
        match result {
            Ok(()) => Ok(true),
            // The notice event prints it
            Err(RuntimeError::Rejected(_)) => Ok(false),
            Err(e) => {
                writeln!(self.out, "! {e}")?;
                Ok(false)
            }
        }
    }

    fn render_event(&mut self, event: &SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::TurnStarted { turn, model_id } => {
                tracing::debug!(turn = %turn, model = %model_id, "Reply started");
                self.open_reply(*turn)?;
            }
            SessionEvent::Delta { text } => {
                tracing::trace!(bytes = text.len(), "Delta");
                // The view already holds this delta and possibly later ones
                let view = self.handle.view();
                if view.running_turn.is_some() && view.running_turn == self.reply {
                    self.catch_up(&view.buffer)?;
                }
            }
            SessionEvent::TurnCompleted {
                turn,
                message,
                usage,
            } => {
                self.close_reply(*turn, &message.content)?;
                tracing::debug!(
                    turn = %turn,
                    message_id = message.id,
                    completion_tokens = usage.as_ref().map(|u| u.completion_tokens),
                    "Reply rendered"
                );
            }
            SessionEvent::ModelSelected { model_id } => writeln!(self.out, "Model: {model_id}")?,
            SessionEvent::CatalogChanged { models } => {
                if models.is_empty() {
                    writeln!(self.out, "No models available; submission disabled.")?;
                } else {
                    writeln!(self.out, "Models: {}", models.join(", "))?;
                }
            }
            SessionEvent::Notice { notice } => match notice.kind {
                NoticeKind::TurnFailed => writeln!(self.out, "! {notice}; partial reply kept")?,
                NoticeKind::Rejected => writeln!(self.out, "! {notice}")?,
            },
            // Already echoed by the terminal
            SessionEvent::MessageAppended { message } => {
                tracing::debug!(message_id = message.id, role = %message.role, "Message appended");
            }
            SessionEvent::Reset => {}
        }
        self.out.flush()
    }

    /// Redraw from the published view after missing events
    fn resync(&mut self) -> io::Result<()> {
        let view = self.handle.view();
        if let Some(turn) = view.running_turn {
            self.open_reply(turn)?;
            if self.reply == Some(turn) {
                self.catch_up(&view.buffer)?;
            }
        } else if let Some(turn) = self.reply {
            let committed = view
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::Assistant)
                .map_or("", |m| m.content.as_str());
            self.close_reply(turn, committed)?;
        }
        self.out.flush()
    }

    fn open_reply(&mut self, turn: TurnId) -> io::Result<()> {
        if self.reply == Some(turn) || self.finished.is_some_and(|done| done >= turn) {
            return Ok(());
        }
        write!(self.out, "Assistant: ")?;
        self.reply = Some(turn);
        self.printed = 0;
        Ok(())
    }

    /// Print whatever part of `text` is not on screen yet
    fn catch_up(&mut self, text: &str) -> io::Result<()> {
        if let Some(rest) = text.get(self.printed..).filter(|r| !r.is_empty()) {
            write!(self.out, "{rest}")?;
            self.printed = text.len();
        }
        Ok(())
    }

    fn close_reply(&mut self, turn: TurnId, content: &str) -> io::Result<()> {
        if self.reply != Some(turn) {
            return Ok(());
        }
        self.catch_up(content)?;
        writeln!(self.out)?;
        self.reply = None;
        self.printed = 0;
        self.finished = Some(turn);
        Ok(())
    }
}
