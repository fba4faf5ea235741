//! Token usage accounting for agent invocations.

use serde::{Deserialize, Serialize};

/// Token usage reported by an agent invocation.
///
/// Serialized with camelCase keys because usage travels inside event
/// payloads and the run record consumed by existing clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Number of input tokens.
    pub input_tokens: i64,
    /// Number of output tokens.
    pub output_tokens: i64,
    /// Total tokens across input and output.
    pub total_tokens: i64,
    /// Input tokens served from cache.
    #[serde(default)]
    pub cached_input_tokens: i64,
    /// Output tokens spent on reasoning.
    #[serde(default)]
    pub reasoning_output_tokens: i64,
}

impl Usage {
    /// Creates a usage record from input/output counts, deriving the total.
    #[must_use]
    pub fn new(input_tokens: i64, output_tokens: i64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cached_input_tokens: 0,
            reasoning_output_tokens: 0,
        }
    }

    /// Adds another usage record to this one, field by field.
    #[must_use]
    pub fn add(&self, other: &Usage) -> Self {
        Self {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
            cached_input_tokens: self.cached_input_tokens + other.cached_input_tokens,
            reasoning_output_tokens: self.reasoning_output_tokens + other.reasoning_output_tokens,
        }
    }
}
