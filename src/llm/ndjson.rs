//! Newline-delimited JSON decoding for `/api/chat` streams
//!
//! Network reads do not respect line boundaries, so bytes are buffered until a
//! full line is available. Incomplete UTF-8 sequences at a read boundary stay
//! in the buffer until the rest of the sequence arrives.

use super::types::{ChatChunk, Usage};
use super::LlmError;
use serde::Deserialize;
use std::time::Duration;

/// One line of an Ollama chat stream
#[derive(Debug, Deserialize)]
struct OllamaChatLine {
    #[serde(default)]
    message: Option<OllamaLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    /// Nanoseconds
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaLineMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental line decoder
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    pending: Vec<u8>,
}

impl NdjsonDecoder {
    /// Feed one network read, returning every chunk completed by it
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<ChatChunk, LlmError>> {
        self.pending.extend_from_slice(bytes);

        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(decoded) = decode_line(&line) {
                out.push(decoded);
            }
        }
        out
    }

    /// Flush whatever is left once the transport closes
    pub fn finish(&mut self) -> Option<Result<ChatChunk, LlmError>> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<Result<ChatChunk, LlmError>> {
    let text = match std::str::from_utf8(raw) {
        Ok(t) => t.trim(),
        Err(e) => return Some(Err(LlmError::protocol(format!("Invalid UTF-8 in stream: {e}")))),
    };
    if text.is_empty() {
        return None;
    }

    let line: OllamaChatLine = match serde_json::from_str(text) {
        Ok(l) => l,
        Err(e) => {
            return Some(Err(LlmError::protocol(format!(
                "Failed to decode stream line: {e} - line: {text}"
            ))))
        }
    };

    if let Some(error) = line.error {
        return Some(Err(LlmError::server_error(error)));
    }

    let content = line.message.and_then(|m| m.content);
    if !line.done {
        return Some(Ok(content.map_or_else(ChatChunk::default, ChatChunk::delta)));
    }

    let usage = Usage {
        prompt_tokens: line.prompt_eval_count.unwrap_or(0),
        completion_tokens: line.eval_count.unwrap_or(0),
        total_duration: line.total_duration.map(Duration::from_nanos),
        done_reason: line.done_reason,
    };
    Some(Ok(ChatChunk {
        content,
        ..ChatChunk::done(usage)
    }))
}
