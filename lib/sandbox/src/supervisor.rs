//! Sandbox lifetime management for one attempt.
//!
//! A supervisor owns the attempt's sandbox handle from provisioning to
//! teardown. Teardown runs in `finish` and never fails the attempt: a
//! snapshot failure is reported as a status event and swallowed, and a
//! close failure is logged.

use crate::error::SandboxError;
use crate::provider::{Sandbox, SandboxProvider};
use crate::retry::{RetryPolicy, with_retry};
use crate::snapshot::{SnapshotLimits, capture_workspace};
use runforge_core::RunId;
use runforge_journal::{EventJournal, EventType};
use runforge_queue::ArtifactStore;
use runforge_store::{ArtifactRecord, RunStore, workspace_snapshot_key};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Hard ceiling on sandbox lifetime.
const MAX_SANDBOX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Hard ceiling on a single command's timeout.
const MAX_COMMAND_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Soft/hard timeout pair for commands run inside the sandbox.
///
/// The soft timeout is what the command is asked to honor; the hard
/// timeout is soft plus a grace window, after which the call itself is
/// abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTimeouts {
    /// Timeout passed to the command.
    pub soft: Duration,
    /// Timeout on the API call wrapping it.
    pub hard: Duration,
}

/// Configuration for sandbox-backed attempts.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Provider template to create sandboxes from.
    pub template: String,
    /// Sandbox lifetime timeout (capped at 24 h).
    pub sandbox_timeout: Duration,
    /// Soft timeout for commands run inside the sandbox.
    pub command_timeout: Duration,
    /// Grace added to the soft timeout before a call is abandoned.
    pub hard_timeout_grace: Duration,
    /// Directory the agent works in; the snapshot root.
    pub workspace_root: String,
    /// Retry policy for provider API calls.
    pub retry: RetryPolicy,
    /// Snapshot budgets.
    pub limits: SnapshotLimits,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            template: "base".to_string(),
            sandbox_timeout: Duration::from_secs(2 * 60 * 60),
            command_timeout: Duration::from_secs(30 * 60),
            hard_timeout_grace: Duration::from_secs(15),
            workspace_root: "/home/user/app".to_string(),
            retry: RetryPolicy::default(),
            limits: SnapshotLimits::default(),
        }
    }
}

impl SandboxConfig {
    /// Returns the effective sandbox timeout, capped at 24 h.
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        self.sandbox_timeout.min(MAX_SANDBOX_TIMEOUT)
    }

    /// Returns the soft/hard pair for sandbox commands:
    /// `hard = min(soft + grace, 30 m)`.
    #[must_use]
    pub fn command_timeouts(&self) -> CommandTimeouts {
        let soft = self.command_timeout.min(MAX_COMMAND_TIMEOUT);
        CommandTimeouts {
            soft,
            hard: (soft + self.hard_timeout_grace).min(MAX_COMMAND_TIMEOUT),
        }
    }
}

/// Owns one attempt's sandbox from creation to teardown.
pub struct SandboxSupervisor {
    sandbox: Arc<dyn Sandbox>,
    run_id: RunId,
    config: SandboxConfig,
}

impl SandboxSupervisor {
    /// Provisions a sandbox for an attempt: creates it (with retry),
    /// persists its id on the run, and emits `status {sandbox_created}`.
    pub async fn provision(
        provider: &Arc<dyn SandboxProvider>,
        config: SandboxConfig,
        run_id: RunId,
        store: &Arc<dyn RunStore>,
        journal: &Arc<dyn EventJournal>,
    ) -> Result<Self, SandboxError> {
        let timeout = config.effective_timeout();
        let template = config.template.clone();
        let sandbox = with_retry(&config.retry, || provider.create(&template, timeout)).await?;

        let sandbox_id = sandbox.id().to_string();
        store
            .set_run_sandbox_id(run_id, Some(&sandbox_id))
            .await
            .map_err(|e| SandboxError::Api {
                message: format!("failed to persist sandbox id: {e}"),
            })?;
        journal
            .append(
                run_id,
                EventType::Status,
                json!({
                    "status": "sandbox_created",
                    "sandboxId": sandbox_id,
                    "template": config.template,
                }),
            )
            .await
            .map_err(|e| SandboxError::Api {
                message: format!("failed to record sandbox creation: {e}"),
            })?;

        Ok(Self {
            sandbox,
            run_id,
            config,
        })
    }

    /// The sandbox handle, for threading into the agent driver.
    #[must_use]
    pub fn sandbox(&self) -> Arc<dyn Sandbox> {
        Arc::clone(&self.sandbox)
    }

    /// The provider-assigned sandbox id.
    #[must_use]
    pub fn sandbox_id(&self) -> &str {
        self.sandbox.id()
    }

    /// Tears the sandbox down at attempt exit.
    ///
    /// When `snapshot` is set (terminal success, or terminal failure after
    /// the final retry) and the run was not cancelled, the workspace is
    /// zipped into the artifact bucket first. The sandbox is then closed
    /// and the persisted id cleared. Nothing here fails the attempt.
    pub async fn finish(
        self,
        snapshot: bool,
        cancelled: bool,
        store: &Arc<dyn RunStore>,
        journal: &Arc<dyn EventJournal>,
        artifacts: &Arc<dyn ArtifactStore>,
    ) {
        if snapshot && !cancelled {
            self.capture_and_store(store, journal, artifacts).await;
        }

        let close_result =
            with_retry(&self.config.retry, || self.sandbox.close()).await;
        if let Err(e) = close_result {
            tracing::warn!(
                run_id = %self.run_id,
                sandbox_id = %self.sandbox.id(),
                error = %e,
                "failed to close sandbox"
            );
        }

        if let Err(e) = store.set_run_sandbox_id(self.run_id, None).await {
            tracing::warn!(run_id = %self.run_id, error = %e, "failed to clear sandbox id");
        }
    }

    async fn capture_and_store(
        &self,
        store: &Arc<dyn RunStore>,
        journal: &Arc<dyn EventJournal>,
        artifacts: &Arc<dyn ArtifactStore>,
    ) {
        let key = workspace_snapshot_key(self.run_id);
        let outcome = async {
            let snapshot = capture_workspace(
                &self.sandbox,
                &self.config.workspace_root,
                &self.config.limits,
            )
            .await
            .map_err(|e| e.to_string())?;
            artifacts
                .put(&key, &snapshot.bytes, "application/zip")
                .await
                .map_err(|e| e.to_string())?;
            store
                .record_artifact(&ArtifactRecord::new(
                    self.run_id,
                    "workspace.zip",
                    key.clone(),
                    "application/zip",
                    snapshot.bytes.len() as i64,
                ))
                .await
                .map_err(|e| e.to_string())?;
            Ok::<_, String>(snapshot)
        }
        .await;

        let event = match outcome {
            Ok(snapshot) => {
                tracing::info!(
                    run_id = %self.run_id,
                    file_count = snapshot.file_count,
                    size_bytes = snapshot.bytes.len(),
                    "stored workspace snapshot"
                );
                json!({
                    "status": "workspace_snapshot_stored",
                    "artifact": key,
                    "sizeBytes": snapshot.bytes.len(),
                    "fileCount": snapshot.file_count,
                })
            }
            Err(error) => {
                tracing::warn!(run_id = %self.run_id, error = %error, "workspace snapshot failed");
                json!({
                    "status": "workspace_snapshot_store_failed",
                    "error": error,
                })
            }
        };

        if let Err(e) = journal.append(self.run_id, EventType::Status, event).await {
            tracing::warn!(run_id = %self.run_id, error = %e, "failed to record snapshot event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSandboxProvider;
    use runforge_queue::InMemoryArtifactStore;
    use runforge_store::{CreateRunParams, InMemoryRunStore};
    use runforge_journal::InMemoryJournal;
    use std::collections::BTreeMap;

    struct Harness {
        provider: Arc<MockSandboxProvider>,
        provider_dyn: Arc<dyn SandboxProvider>,
        store: Arc<dyn RunStore>,
        journal_mem: InMemoryJournal,
        journal: Arc<dyn EventJournal>,
        artifacts_mem: InMemoryArtifactStore,
        artifacts: Arc<dyn ArtifactStore>,
    }

    impl Harness {
        fn new() -> Self {
            let provider = Arc::new(MockSandboxProvider::new());
            let journal_mem = InMemoryJournal::new();
            let store_mem = InMemoryRunStore::new(journal_mem.clone());
            let artifacts_mem = InMemoryArtifactStore::new();
            Self {
                provider_dyn: Arc::clone(&provider) as Arc<dyn SandboxProvider>,
                provider,
                store: Arc::new(store_mem),
                journal: Arc::new(journal_mem.clone()),
                journal_mem,
                artifacts: Arc::new(artifacts_mem.clone()),
                artifacts_mem,
            }
        }

        async fn run_id(&self) -> RunId {
            let (run, _) = self
                .store
                .create_run(CreateRunParams::new(
                    runforge_core::ProjectId::new(),
                    "seed",
                ))
                .await
                .unwrap();
            run.id
        }

        fn config() -> SandboxConfig {
            SandboxConfig {
                workspace_root: "/home/user/app".to_string(),
                retry: RetryPolicy {
                    attempts: 3,
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(2),
                },
                ..SandboxConfig::default()
            }
        }
    }

    #[tokio::test]
    async fn provision_persists_id_and_emits_event() {
        let h = Harness::new();
        let run_id = h.run_id().await;

        let supervisor = SandboxSupervisor::provision(
            &h.provider_dyn,
            Harness::config(),
            run_id,
            &h.store,
            &h.journal,
        )
        .await
        .unwrap();

        let run = h.store.get_run(run_id).await.unwrap().unwrap();
        assert_eq!(run.sandbox_id.as_deref(), Some(supervisor.sandbox_id()));
        assert!(
            h.journal_mem
                .status_trail(run_id)
                .contains(&"sandbox_created".to_string())
        );
    }

    #[tokio::test]
    async fn provision_retries_transient_failures() {
        let h = Harness::new();
        let run_id = h.run_id().await;
        h.provider.fail_next_creates(vec![SandboxError::Api {
            message: "502 bad gateway".to_string(),
        }]);

        let supervisor = SandboxSupervisor::provision(
            &h.provider_dyn,
            Harness::config(),
            run_id,
            &h.store,
            &h.journal,
        )
        .await
        .unwrap();
        assert_eq!(supervisor.sandbox_id(), "sbx_0001");
    }

    #[tokio::test]
    async fn finish_snapshots_closes_and_clears() {
        let h = Harness::new();
        let run_id = h.run_id().await;
        let mut files = BTreeMap::new();
        files.insert(
            "/home/user/app/src/main.rs".to_string(),
            b"fn main() {}".to_vec(),
        );
        h.provider.seed_files(files);

        let supervisor = SandboxSupervisor::provision(
            &h.provider_dyn,
            Harness::config(),
            run_id,
            &h.store,
            &h.journal,
        )
        .await
        .unwrap();
        let sandbox_id = supervisor.sandbox_id().to_string();

        supervisor
            .finish(true, false, &h.store, &h.journal, &h.artifacts)
            .await;

        // snapshot landed in the bucket and an artifact row exists
        let key = workspace_snapshot_key(run_id);
        assert!(h.artifacts_mem.get(&key).await.unwrap().is_some());
        let rows = h.store.list_artifacts(run_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "workspace.zip");
        assert!(rows[0].size > 0);

        // sandbox closed, persisted id cleared
        assert!(h.provider.sandbox(&sandbox_id).unwrap().is_closed());
        let run = h.store.get_run(run_id).await.unwrap().unwrap();
        assert!(run.sandbox_id.is_none());

        assert!(
            h.journal_mem
                .status_trail(run_id)
                .contains(&"workspace_snapshot_stored".to_string())
        );
    }

    #[tokio::test]
    async fn finish_skips_snapshot_when_cancelled() {
        let h = Harness::new();
        let run_id = h.run_id().await;

        let supervisor = SandboxSupervisor::provision(
            &h.provider_dyn,
            Harness::config(),
            run_id,
            &h.store,
            &h.journal,
        )
        .await
        .unwrap();

        supervisor
            .finish(true, true, &h.store, &h.journal, &h.artifacts)
            .await;

        let trail = h.journal_mem.status_trail(run_id);
        assert!(!trail.contains(&"workspace_snapshot_stored".to_string()));
        assert!(!trail.contains(&"workspace_snapshot_store_failed".to_string()));
        assert!(h.store.list_artifacts(run_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_failure_is_reported_not_raised() {
        let h = Harness::new();
        let run_id = h.run_id().await;
        let mut files = BTreeMap::new();
        files.insert("/home/user/app/a.txt".to_string(), vec![0u8; 64]);
        files.insert("/home/user/app/b.txt".to_string(), vec![0u8; 64]);
        h.provider.seed_files(files);

        let mut config = Harness::config();
        config.limits = SnapshotLimits {
            max_files: 1,
            max_bytes: 1024,
        };

        let supervisor = SandboxSupervisor::provision(
            &h.provider_dyn,
            config,
            run_id,
            &h.store,
            &h.journal,
        )
        .await
        .unwrap();
        supervisor
            .finish(true, false, &h.store, &h.journal, &h.artifacts)
            .await;

        assert!(
            h.journal_mem
                .status_trail(run_id)
                .contains(&"workspace_snapshot_store_failed".to_string())
        );
        assert!(h.store.list_artifacts(run_id).await.unwrap().is_empty());
    }

    #[test]
    fn sandbox_timeout_is_capped() {
        let config = SandboxConfig {
            sandbox_timeout: Duration::from_secs(48 * 60 * 60),
            ..SandboxConfig::default()
        };
        assert_eq!(config.effective_timeout(), MAX_SANDBOX_TIMEOUT);
    }

    #[test]
    fn command_timeouts_add_grace_under_the_cap() {
        let config = SandboxConfig {
            command_timeout: Duration::from_secs(60),
            hard_timeout_grace: Duration::from_secs(15),
            ..SandboxConfig::default()
        };
        let timeouts = config.command_timeouts();
        assert_eq!(timeouts.soft, Duration::from_secs(60));
        assert_eq!(timeouts.hard, Duration::from_secs(75));

        // at the default soft timeout the cap flattens the grace
        let capped = SandboxConfig::default().command_timeouts();
        assert_eq!(capped.soft, capped.hard);
    }
}
