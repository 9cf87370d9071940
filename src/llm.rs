//! Model server abstraction
//!
//! Provides a streaming chat interface over the Ollama HTTP API.

mod error;
mod ndjson;
mod ollama;
mod types;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub mod testing;

pub use error::LlmError;
#[cfg(test)]
pub use error::LlmErrorKind;
pub use ollama::OllamaService;
pub use types::*;

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Common interface for streaming chat backends
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Open a streaming chat call. Errors here mean no bytes of the reply
    /// were received; errors after that arrive inside the stream.
    async fn stream_chat(&self, request: &LlmRequest) -> Result<ChunkStream, LlmError>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Logging wrapper for chat services
pub struct LoggingService {
    inner: Arc<dyn ChatService>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn ChatService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ChatService for LoggingService {
    async fn stream_chat(&self, request: &LlmRequest) -> Result<ChunkStream, LlmError> {
        let start = Instant::now();
        let model = request.model.clone();
        let result = self.inner.stream_chat(request).await;

        match result {
            Ok(stream) => {
                tracing::debug!(
                    backend = %self.inner.name(),
                    model = %model,
                    messages = request.messages.len(),
                    first_byte_ms = %start.elapsed().as_millis(),
                    "Chat stream opened"
                );
                let mut deltas = 0usize;
                let logged = stream.inspect(move |item| match item {
                    Ok(chunk) if chunk.done => {
                        let usage = chunk.usage.clone().unwrap_or_default();
                        tracing::info!(
                            model = %model,
                            duration_ms = %start.elapsed().as_millis(),
                            deltas,
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            server_ms = ?usage.total_duration.map(|d| d.as_millis()),
                            done_reason = usage.done_reason.as_deref().unwrap_or("unknown"),
                            "Chat stream completed"
                        );
                    }
                    Ok(_) => deltas += 1,
                    Err(e) => {
                        tracing::error!(
                            model = %model,
                            duration_ms = %start.elapsed().as_millis(),
                            deltas,
                            error = %e.message,
                            kind = e.kind.as_str(),
                            "Chat stream failed"
                        );
                    }
                });
                Ok(logged.boxed())
            }
            Err(e) => {
                tracing::error!(
                    backend = %self.inner.name(),
                    model = %model,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    "Chat request failed"
                );
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
