//! Accumulator for the reply of the in-flight turn

/// Growing text buffer fed by stream deltas. Owned by the runtime actor, so
/// `push_delta` and `flush` are serialized by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamAccumulator {
    buffer: String,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one delta in arrival order
    pub fn push_delta(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Take the accumulated text, leaving the buffer empty
    pub fn flush(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    /// Partial, uncommitted reply as rendered live
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
