//! Chat-turn messages threaded onto runs.

use chrono::{DateTime, Utc};
use runforge_core::{MessageId, ProjectId, RunId};
use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User/human message (the prompt).
    User,
    /// Assistant message (the run's output).
    Assistant,
}

impl MessageRole {
    /// Returns the wire/storage name of this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parses a storage value; unknown values map to `User`.
    #[must_use]
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "assistant" => Self::Assistant,
            _ => Self::User,
        }
    }
}

/// A user-visible chat turn, keyed by `(project_id, run_id)` and
/// append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Message ID.
    pub id: MessageId,
    /// Project the thread belongs to.
    pub project_id: ProjectId,
    /// Run the turn is associated with.
    pub run_id: RunId,
    /// Sender role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
    /// When the message was recorded.
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Creates a new message stamped with the current time.
    #[must_use]
    pub fn new(
        project_id: ProjectId,
        run_id: RunId,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            project_id,
            run_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names_roundtrip() {
        assert_eq!(MessageRole::from_str_value("user"), MessageRole::User);
        assert_eq!(
            MessageRole::from_str_value("assistant"),
            MessageRole::Assistant
        );
        assert_eq!(MessageRole::from_str_value("other"), MessageRole::User);
    }
}
