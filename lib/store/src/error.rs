//! Error types for the store crate.

use crate::run::RunStatus;
use runforge_core::RunId;
use std::fmt;

/// Errors from run store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A status transition was rejected.
    InvalidTransition {
        run_id: RunId,
        from: RunStatus,
        to: RunStatus,
    },
    /// The run does not exist.
    RunNotFound { run_id: RunId },
    /// A conditional update found the row in an unexpected state.
    Conflict { run_id: RunId, message: String },
    /// Contention on a monotonic counter persisted past retries.
    IndexContention { attempts: u32 },
    /// Underlying query failed.
    Query { message: String },
    /// A stored row could not be decoded.
    Decode { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition { run_id, from, to } => {
                write!(
                    f,
                    "invalid status transition for run {run_id}: {} -> {}",
                    from.as_str(),
                    to.as_str()
                )
            }
            Self::RunNotFound { run_id } => write!(f, "run not found: {run_id}"),
            Self::Conflict { run_id, message } => {
                write!(f, "conflicting update for run {run_id}: {message}")
            }
            Self::IndexContention { attempts } => {
                write!(f, "gave up assigning run index after {attempts} collisions")
            }
            Self::Query { message } => write!(f, "store query failed: {message}"),
            Self::Decode { message } => write!(f, "store row decode failed: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query {
            message: e.to_string(),
        }
    }
}
