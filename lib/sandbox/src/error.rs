//! Error types for the sandbox crate.

use std::fmt;

/// Errors from sandbox provider operations.
///
/// The message string is significant: the retry wrapper classifies
/// transient failures by matching against it, mirroring how the provider
/// SDK reports errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// The provider API call failed.
    Api { message: String },
    /// The sandbox no longer exists or was already closed.
    Gone { sandbox_id: String },
    /// A command run inside the sandbox failed.
    Command { command: String, message: String },
}

impl SandboxError {
    /// Returns the classifiable message of this error.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Api { message } | Self::Command { message, .. } => message,
            Self::Gone { .. } => "sandbox gone",
        }
    }
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api { message } => write!(f, "sandbox api error: {message}"),
            Self::Gone { sandbox_id } => write!(f, "sandbox gone: {sandbox_id}"),
            Self::Command { command, message } => {
                write!(f, "sandbox command '{command}' failed: {message}")
            }
        }
    }
}

impl std::error::Error for SandboxError {}

/// Errors from snapshot capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The workspace holds more files than the snapshot budget allows.
    TooManyFiles { count: usize, limit: usize },
    /// The workspace exceeds the snapshot byte budget.
    TooLarge { bytes: u64, limit: u64 },
    /// Enumerating or reading the workspace failed.
    Sandbox(SandboxError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyFiles { count, limit } => {
                write!(f, "workspace has {count} files, snapshot limit is {limit}")
            }
            Self::TooLarge { bytes, limit } => {
                write!(f, "workspace is {bytes} bytes, snapshot limit is {limit}")
            }
            Self::Sandbox(e) => write!(f, "snapshot failed: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<SandboxError> for SnapshotError {
    fn from(e: SandboxError) -> Self {
        Self::Sandbox(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_error_display() {
        let err = SnapshotError::TooManyFiles {
            count: 30_000,
            limit: 20_000,
        };
        assert!(err.to_string().contains("30000"));
        assert!(err.to_string().contains("20000"));
    }
}
