//! Error types for the queue crate.

use std::fmt;

/// Errors from queue bus operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Failed to connect to the bus or set up streams.
    ConnectionFailed { message: String },
    /// Failed to publish a message.
    PublishFailed { message: String },
    /// Failed to receive or acknowledge a message.
    ReceiveFailed { message: String },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { message } => {
                write!(f, "queue connection failed: {message}")
            }
            Self::PublishFailed { message } => write!(f, "queue publish failed: {message}"),
            Self::ReceiveFailed { message } => write!(f, "queue receive failed: {message}"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Errors from artifact store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStoreError {
    /// Failed to store data.
    StoreFailed { message: String },
    /// Failed to retrieve data.
    RetrieveFailed { message: String },
}

impl fmt::Display for ArtifactStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreFailed { message } => write!(f, "artifact store put failed: {message}"),
            Self::RetrieveFailed { message } => {
                write!(f, "artifact store get failed: {message}")
            }
        }
    }
}

impl std::error::Error for ArtifactStoreError {}
