//! Events emitted by the agent during a run.

use runforge_journal::EventType;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The kind of an agent event. Terminal journal events (`done`/`error`)
/// are written by the orchestrator, never by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEventKind {
    /// A chunk of model output text.
    Token,
    /// A tool invocation (phase start/end/error/stream in the payload).
    Tool,
    /// A file operation in the workspace.
    FileOp,
    /// A progress notification; the `status` payload string is opaque and
    /// passed through unfiltered.
    Status,
}

impl From<AgentEventKind> for EventType {
    fn from(kind: AgentEventKind) -> Self {
        match kind {
            AgentEventKind::Token => EventType::Token,
            AgentEventKind::Tool => EventType::Tool,
            AgentEventKind::FileOp => EventType::FileOp,
            AgentEventKind::Status => EventType::Status,
        }
    }
}

/// One event from the agent's stream, forwarded verbatim to the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    /// The event kind.
    pub kind: AgentEventKind,
    /// Opaque payload.
    pub payload: JsonValue,
}

impl AgentEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(kind: AgentEventKind, payload: JsonValue) -> Self {
        Self { kind, payload }
    }

    /// Creates a `status` event with the given status string.
    #[must_use]
    pub fn status(status: &str) -> Self {
        Self::new(
            AgentEventKind::Status,
            serde_json::json!({ "status": status }),
        )
    }

    /// Creates a `token` event with the given text.
    #[must_use]
    pub fn token(text: &str) -> Self {
        Self::new(AgentEventKind::Token, serde_json::json!({ "text": text }))
    }
}
