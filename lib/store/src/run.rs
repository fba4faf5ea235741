//! Run records and status machinery.

use chrono::{DateTime, Utc};
use runforge_core::{ProjectId, RunId, Usage};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// User-visible status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting for a worker to claim it.
    Queued,
    /// An attempt is executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error after exhausting retries.
    Error,
    /// Cancelled by user or system.
    Cancelled,
}

impl RunStatus {
    /// Returns the wire/storage name of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a storage value back into a status. Unknown values map to
    /// `Queued` so a half-migrated row degrades to re-execution rather
    /// than a decode failure.
    #[must_use]
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "completed" => Self::Completed,
            "error" => Self::Error,
            "cancelled" => Self::Cancelled,
            _ => Self::Queued,
        }
    }

    /// Returns true if this is a terminal status. Terminal statuses are
    /// sticky: no transition leaves them.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    /// Returns true if a transition from `self` to `to` is allowed.
    #[must_use]
    pub fn can_transition(&self, to: RunStatus) -> bool {
        match (self, to) {
            (Self::Queued, Self::Running | Self::Cancelled) => true,
            (Self::Running, Self::Completed | Self::Error | Self::Cancelled | Self::Queued) => true,
            _ => false,
        }
    }
}

/// Where an attempt's workspace lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceBackend {
    /// The worker's own filesystem.
    Host,
    /// A remote sandbox provisioned per attempt.
    E2b,
}

impl WorkspaceBackend {
    /// Returns the wire/storage name of this backend.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::E2b => "e2b",
        }
    }

    /// Parses a storage value; unknown values map to `Host`.
    #[must_use]
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "e2b" => Self::E2b,
            _ => Self::Host,
        }
    }
}

/// A run: one invocation of the agent on a prompt, scoped to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run ID.
    pub id: RunId,
    /// Project the run belongs to.
    pub project_id: ProjectId,
    /// Run this one continues, if any.
    pub parent_run_id: Option<RunId>,
    /// Monotonic index within the project.
    pub run_index: i64,
    /// Client-supplied idempotency key, unique per project when present.
    pub idempotency_key: Option<String>,
    /// The natural-language prompt.
    pub prompt: String,
    /// Opaque structured input.
    pub input: Option<JsonValue>,
    /// Requested model provider.
    pub provider: Option<String>,
    /// Requested model.
    pub model: Option<String>,
    /// Effective workspace backend.
    pub workspace_backend: WorkspaceBackend,
    /// Current status.
    pub status: RunStatus,
    /// 1-based number of the attempt currently or last executing; 0 before
    /// the first claim.
    pub attempt: i32,
    /// Attempt budget.
    pub max_attempts: i32,
    /// Sandbox owned by the live attempt, if any.
    pub sandbox_id: Option<String>,
    /// Agent output on success.
    pub output: Option<String>,
    /// Error text on terminal failure.
    pub error: Option<String>,
    /// Token usage; only written on success.
    pub usage: Option<Usage>,
    /// Wall-clock duration of the successful attempt.
    pub duration_ms: Option<i64>,
    /// Currency of the cost estimate.
    pub cost_currency: String,
    /// Estimated cost in USD, when pricing is known.
    pub estimated_cost_usd: Option<f64>,
    /// Pricing table version used for the estimate.
    pub pricing_version: Option<String>,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// When the first attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a run.
#[derive(Debug, Clone)]
pub struct CreateRunParams {
    /// Project the run belongs to.
    pub project_id: ProjectId,
    /// The natural-language prompt.
    pub prompt: String,
    /// Opaque structured input.
    pub input: Option<JsonValue>,
    /// Requested model provider.
    pub provider: Option<String>,
    /// Requested model.
    pub model: Option<String>,
    /// Workspace backend for the run.
    pub workspace_backend: WorkspaceBackend,
    /// Client-supplied idempotency key.
    pub idempotency_key: Option<String>,
    /// Run this one continues.
    pub parent_run_id: Option<RunId>,
    /// Attempt budget.
    pub max_attempts: i32,
}

impl CreateRunParams {
    /// Creates parameters with the host backend and a budget of three
    /// attempts; the common case for tests.
    #[must_use]
    pub fn new(project_id: ProjectId, prompt: impl Into<String>) -> Self {
        Self {
            project_id,
            prompt: prompt.into(),
            input: None,
            provider: None,
            model: None,
            workspace_backend: WorkspaceBackend::Host,
            idempotency_key: None,
            parent_run_id: None,
            max_attempts: 3,
        }
    }
}

/// Result metadata written by `complete_run`.
#[derive(Debug, Clone, Default)]
pub struct CompletionMeta {
    /// Provider that served the run.
    pub provider: Option<String>,
    /// Model that served the run.
    pub model: Option<String>,
    /// Token usage of the successful attempt.
    pub usage: Option<Usage>,
    /// Wall-clock duration of the successful attempt.
    pub duration_ms: Option<i64>,
    /// Estimated cost in USD.
    pub estimated_cost_usd: Option<f64>,
    /// Pricing table version used for the estimate.
    pub pricing_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_sticky() {
        for terminal in [RunStatus::Completed, RunStatus::Error, RunStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for to in [
                RunStatus::Queued,
                RunStatus::Running,
                RunStatus::Completed,
                RunStatus::Error,
                RunStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition(to));
            }
        }
    }

    #[test]
    fn queued_transitions() {
        assert!(RunStatus::Queued.can_transition(RunStatus::Running));
        assert!(RunStatus::Queued.can_transition(RunStatus::Cancelled));
        assert!(!RunStatus::Queued.can_transition(RunStatus::Completed));
        assert!(!RunStatus::Queued.can_transition(RunStatus::Error));
    }

    #[test]
    fn running_transitions() {
        assert!(RunStatus::Running.can_transition(RunStatus::Completed));
        assert!(RunStatus::Running.can_transition(RunStatus::Error));
        assert!(RunStatus::Running.can_transition(RunStatus::Cancelled));
        // retry path reverts to queued
        assert!(RunStatus::Running.can_transition(RunStatus::Queued));
    }

    #[test]
    fn status_wire_names_roundtrip() {
        for status in [
            RunStatus::Queued,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Error,
            RunStatus::Cancelled,
        ] {
            assert_eq!(RunStatus::from_str_value(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_backend_defaults_to_host() {
        assert_eq!(
            WorkspaceBackend::from_str_value("firecracker"),
            WorkspaceBackend::Host
        );
        assert_eq!(WorkspaceBackend::from_str_value("e2b"), WorkspaceBackend::E2b);
    }
}
