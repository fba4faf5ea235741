//! Host post-commit hook.
//!
//! For host-backed runs, the workspace lives on the worker's own
//! filesystem and a successful run is committed there. The hook is a
//! collaborator and is not allowed to throw; the supervisor always
//! records a status event describing what happened.

use async_trait::async_trait;
use runforge_core::RunId;

/// Outcome of the post-commit hook.
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    /// Whether the commit succeeded.
    pub ok: bool,
    /// Whether the hook decided there was nothing to commit.
    pub skipped: bool,
    /// Error text when the commit failed.
    pub error: Option<String>,
    /// The resulting commit SHA on success.
    pub commit_sha: Option<String>,
}

impl CommitOutcome {
    /// The status event string for this outcome.
    #[must_use]
    pub fn status(&self) -> &'static str {
        if self.skipped {
            "git_commit_skipped"
        } else if self.ok {
            "git_commit"
        } else {
            "git_commit_error"
        }
    }
}

/// Commits a host-backed run's workspace after success.
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    /// Commits the workspace. Must not fail; problems are reported in
    /// the outcome.
    async fn commit(&self, run_id: RunId) -> CommitOutcome;
}

/// Hook used when no host workspace is configured: always skips.
pub struct NoopPostCommitHook;

#[async_trait]
impl PostCommitHook for NoopPostCommitHook {
    async fn commit(&self, _run_id: RunId) -> CommitOutcome {
        CommitOutcome {
            ok: true,
            skipped: true,
            ..CommitOutcome::default()
        }
    }
}
