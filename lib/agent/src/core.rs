//! The agent core contract.
//!
//! The LLM dialogue (prompt construction, tool schemas, the plan/build
//! phases) lives entirely behind this trait; the orchestrator schedules
//! one `run` call per attempt and consumes the event stream.

use crate::error::AgentError;
use crate::event::AgentEvent;
use async_trait::async_trait;
use runforge_core::{RunId, Usage};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Where the resolved model choice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSource {
    /// The client named the model in the request.
    Request,
    /// The deployment environment supplied it.
    Env,
    /// The built-in default.
    Default,
}

impl ModelSource {
    /// Returns the wire name of this source.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Env => "env",
            Self::Default => "default",
        }
    }
}

/// Inputs for one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// The run this invocation belongs to.
    pub run_id: RunId,
    /// The natural-language prompt.
    pub prompt: String,
    /// Opaque structured input.
    pub input: Option<JsonValue>,
    /// Requested model provider, if any.
    pub provider: Option<String>,
    /// Requested model, if any.
    pub model: Option<String>,
    /// Effective workspace backend (`host` or `e2b`).
    pub workspace_backend: String,
}

/// The agent's result on success.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRunResult {
    /// The final output text.
    pub output: String,
    /// Provider that served the run.
    pub provider: String,
    /// Model that served the run.
    pub model: String,
    /// Where the model choice came from.
    pub model_source: ModelSource,
    /// Token usage, when the provider reports it.
    pub usage: Option<Usage>,
    /// Wall-clock duration of the invocation.
    pub duration_ms: Option<i64>,
}

/// One coding-agent invocation.
///
/// Implementations must observe the cancellation token promptly and
/// report cancellation as [`AgentError::Aborted`]. Events are delivered
/// through the sender in causal order.
#[async_trait]
pub trait AgentCore: Send + Sync {
    /// Runs the agent to completion, streaming events as it goes.
    async fn run(
        &self,
        request: AgentRequest,
        cancel: CancellationToken,
        events: mpsc::UnboundedSender<AgentEvent>,
    ) -> Result<AgentRunResult, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_source_wire_names() {
        assert_eq!(ModelSource::Request.as_str(), "request");
        assert_eq!(ModelSource::Env.as_str(), "env");
        assert_eq!(ModelSource::Default.as_str(), "default");
    }
}
