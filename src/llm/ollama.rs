//! Ollama HTTP transport

use super::ndjson::NdjsonDecoder;
use super::types::{ChatChunk, ChunkStream, LlmMessage, LlmRequest};
use super::{ChatService, LlmError};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Client for a locally hosted Ollama server
#[derive(Clone, Debug)]
pub struct OllamaService {
    client: Client,
    base_url: String,
    probe_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelInfo>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelInfo {
    name: String,
}

impl OllamaService {
    pub fn new(base_url: &str, probe_timeout: Duration) -> Result<Self, LlmError> {
        // No overall request timeout: a reply streams for as long as the model
        // keeps generating.
        let client = Client::builder()
            .connect_timeout(probe_timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            probe_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /`; the server answers 200 "Ollama is running" when up
    pub async fn probe(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        if status == reqwest::StatusCode::OK {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(LlmError::from_status(status.as_u16(), &body))
        }
    }

    /// `GET /api/tags`, keeping only model names in server order
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;
        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &body));
        }

        let tags: OllamaTagsResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::protocol(format!("Failed to parse model list: {e} - body: {body}"))
        })?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl ChatService for OllamaService {
    async fn stream_chat(&self, request: &LlmRequest) -> Result<ChunkStream, LlmError> {
        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), &body));
        }

        Ok(decode_chunks(response.bytes_stream()).boxed())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

struct ChunkReader<S> {
    bytes: S,
    decoder: NdjsonDecoder,
    ready: VecDeque<Result<ChatChunk, LlmError>>,
    exhausted: bool,
}

/// Turn a raw byte stream into decoded chunks. The output ends after the
/// first `done` chunk or the first error, whichever comes first.
pub(crate) fn decode_chunks<S, B, E>(bytes: S) -> impl Stream<Item = Result<ChatChunk, LlmError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let reader = ChunkReader {
        bytes: Box::pin(bytes),
        decoder: NdjsonDecoder::default(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(item) = reader.ready.pop_front() {
                let terminal = match &item {
                    Ok(chunk) => chunk.done,
                    Err(_) => true,
                };
                if terminal {
                    reader.ready.clear();
                    reader.exhausted = true;
                }
                return Some((item, reader));
            }
            if reader.exhausted {
                return None;
            }
            match reader.bytes.next().await {
                Some(Ok(bytes)) => {
                    let decoded = reader.decoder.push(bytes.as_ref());
                    reader.ready.extend(decoded);
                }
                Some(Err(e)) => {
                    reader
                        .ready
                        .push_back(Err(LlmError::network(format!("Stream read error: {e}"))));
                }
                None => {
                    reader.exhausted = true;
                    reader.ready.extend(reader.decoder.finish());
                }
            }
        }
    })
}
