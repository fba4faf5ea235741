//! Event records for the per-run journal.

use chrono::{DateTime, Utc};
use runforge_core::RunId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The type of a journal event.
///
/// Payloads are opaque JSON; consumers must not rely on payload schema
/// beyond the type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Lifecycle and progress notifications (`{"status": "..."}` payloads).
    Status,
    /// A chunk of model output text.
    Token,
    /// A tool invocation (phases: start, end, error, stream).
    Tool,
    /// A file operation performed in the workspace.
    FileOp,
    /// Terminal success event; at most one per run.
    Done,
    /// Terminal failure event; at most one per run.
    Error,
    /// Keepalive for stream consumers.
    Ping,
}

impl EventType {
    /// Returns the wire name of this event type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Token => "token",
            Self::Tool => "tool",
            Self::FileOp => "file_op",
            Self::Done => "done",
            Self::Error => "error",
            Self::Ping => "ping",
        }
    }

    /// Parses a wire name back into an event type.
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "status" => Some(Self::Status),
            "token" => Some(Self::Token),
            "tool" => Some(Self::Tool),
            "file_op" => Some(Self::FileOp),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            "ping" => Some(Self::Ping),
            _ => None,
        }
    }

    /// Returns true if this event type ends a run's journal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// A single journal entry for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Globally monotonic identifier; insertion order matches id order.
    pub id: i64,
    /// The run this event belongs to.
    pub run_id: RunId,
    /// Dense 1..N sequence within the run.
    pub seq: i64,
    /// The event type tag.
    pub event_type: EventType,
    /// Opaque JSON payload.
    pub payload: JsonValue,
    /// When the event was appended.
    pub ts: DateTime<Utc>,
}
