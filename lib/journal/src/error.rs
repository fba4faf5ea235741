//! Error types for the journal crate.

use runforge_core::RunId;
use std::fmt;

/// Errors from journal operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalError {
    /// The sequence slot kept colliding with concurrent appenders.
    SeqContention {
        run_id: RunId,
        attempts: u32,
    },
    /// Underlying query failed.
    Query { message: String },
    /// A stored row could not be decoded.
    Decode { message: String },
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeqContention { run_id, attempts } => {
                write!(
                    f,
                    "gave up appending event for run {run_id} after {attempts} seq collisions"
                )
            }
            Self::Query { message } => write!(f, "journal query failed: {message}"),
            Self::Decode { message } => write!(f, "journal row decode failed: {message}"),
        }
    }
}

impl std::error::Error for JournalError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_contention_display() {
        let err = JournalError::SeqContention {
            run_id: RunId::new(),
            attempts: 5,
        };
        assert!(err.to_string().contains("5 seq collisions"));
    }
}
