//! Ollama Chat - terminal chat client for a local model server
//!
//! Streams replies from an Ollama server into a single-session conversation
//! driven by a state machine and an actor runtime.

mod catalog;
mod config;
mod conversation;
mod llm;
mod repl;
mod runtime;
mod state_machine;
mod stream_buffer;

use catalog::{connect, report_startup_failure, STARTUP_FAILURE_EXIT_CODE};
use config::ChatConfig;
use llm::{ChatService, LoggingService};
use repl::{spawn_stdin_reader, Repl};
use runtime::{spawn_session, SessionOptions};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never mix with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ollama_chat=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ChatConfig::from_env()?;
    let (ollama, models) = match connect(&config).await {
        Ok(connected) => connected,
        Err(e) => {
            tracing::error!(url = %config.base_url, error = %e, "Startup failed");
            report_startup_failure(&e, &config.base_url, &mut std::io::stderr())?;
            std::process::exit(STARTUP_FAILURE_EXIT_CODE);
        }
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        session_id = %session_id,
        url = %ollama.base_url(),
        models = models.len(),
        "Starting chat session"
    );

    let catalog = Arc::new(ollama.clone());
    let inner: Arc<dyn ChatService> = Arc::new(ollama);
    let handle = spawn_session(
        LoggingService::new(inner),
        SessionOptions {
            session_id,
            models,
            preferred_model: Some(config.default_model),
            system_prompt: config.system_prompt,
        },
    );

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let input = spawn_stdin_reader()?;
    let repl = Repl::new(handle.clone(), catalog, std::io::stdout());
    let result = repl.run(input, shutdown).await;
    handle.shutdown();
    result?;
    Ok(())
}
