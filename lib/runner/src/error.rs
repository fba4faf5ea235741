//! Error types for the runner crate.

use runforge_journal::JournalError;
use runforge_queue::QueueError;
use runforge_store::StoreError;
use std::fmt;

/// Errors from the run supervisor and schedulers.
#[derive(Debug)]
pub enum RunnerError {
    /// Store operation failed.
    Store(StoreError),
    /// Journal operation failed.
    Journal(JournalError),
    /// Queue operation failed.
    Queue(QueueError),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::Journal(e) => write!(f, "journal error: {e}"),
            Self::Queue(e) => write!(f, "queue error: {e}"),
        }
    }
}

impl std::error::Error for RunnerError {}

impl From<StoreError> for RunnerError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<JournalError> for RunnerError {
    fn from(e: JournalError) -> Self {
        Self::Journal(e)
    }
}

impl From<QueueError> for RunnerError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}
