//! Durable job records: the queue's view of a run.

use chrono::{DateTime, Utc};
use runforge_core::RunId;
use serde::{Deserialize, Serialize};

/// Queue status of a job. A run and its job move in lockstep but are not
/// equal: a job sits `queued` with a future `next_run_at` during backoff
/// while the run is also `queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed (possibly not before `next_run_at`).
    Queued,
    /// Claimed by a worker.
    Running,
    /// The run completed.
    Succeeded,
    /// The run failed after exhausting retries.
    Failed,
    /// The run was cancelled.
    Cancelled,
}

impl JobStatus {
    /// Returns the wire/storage name of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a storage value; unknown values map to `Queued`.
    #[must_use]
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => Self::Queued,
        }
    }

    /// Returns true if this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// The execution record paired 1:1 with a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// The run this job tracks.
    pub run_id: RunId,
    /// Queue status.
    pub status: JobStatus,
    /// Number of failed attempts so far (1-based after the first failure).
    pub attempts: i32,
    /// Attempt budget, mirrored from the run.
    pub max_attempts: i32,
    /// Earliest time the job may be claimed again.
    pub next_run_at: DateTime<Utc>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// Last modification time; drives stale-running detection.
    pub updated_at: DateTime<Utc>,
}

/// Computes the retry delay in seconds for a failed attempt:
/// `min(max_backoff, 2^attempts)`, with `attempts` 1-based after the
/// first failure.
#[must_use]
pub fn retry_delay_seconds(attempts: i32, max_backoff: i64) -> i64 {
    let exp = attempts.clamp(0, 62) as u32;
    max_backoff.min(2i64.saturating_pow(exp))
}
