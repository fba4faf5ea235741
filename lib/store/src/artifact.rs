//! Artifact records: run byproducts stored by reference.

use chrono::{DateTime, Utc};
use runforge_core::{ArtifactId, RunId};
use serde::{Deserialize, Serialize};

/// A byproduct of a run, stored in the artifact bucket and referenced by
/// key. Write-once: recorded when the snapshot lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Artifact ID.
    pub id: ArtifactId,
    /// The run that produced the artifact.
    pub run_id: RunId,
    /// Human-readable name, e.g. `workspace.zip`.
    pub name: String,
    /// Object-store key.
    pub path: String,
    /// MIME type.
    pub mime: String,
    /// Size in bytes.
    pub size: i64,
    /// When the artifact was recorded.
    pub created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Creates a new artifact record stamped with the current time.
    #[must_use]
    pub fn new(
        run_id: RunId,
        name: impl Into<String>,
        path: impl Into<String>,
        mime: impl Into<String>,
        size: i64,
    ) -> Self {
        Self {
            id: ArtifactId::new(),
            run_id,
            name: name.into(),
            path: path.into(),
            mime: mime.into(),
            size,
            created_at: Utc::now(),
        }
    }
}

/// Returns the canonical object-store key for a run's workspace snapshot.
#[must_use]
pub fn workspace_snapshot_key(run_id: RunId) -> String {
    format!("runs/{run_id}/workspace.zip")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_key_format() {
        let run_id = RunId::new();
        let key = workspace_snapshot_key(run_id);
        assert_eq!(key, format!("runs/{run_id}/workspace.zip"));
    }

    #[test]
    fn artifact_record_new() {
        let run_id = RunId::new();
        let artifact = ArtifactRecord::new(run_id, "workspace.zip", "runs/x/workspace.zip", "application/zip", 42);
        assert_eq!(artifact.run_id, run_id);
        assert_eq!(artifact.size, 42);
    }
}
