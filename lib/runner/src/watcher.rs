//! Attempt-scoped cancellation watcher.

use runforge_core::RunId;
use runforge_store::{RunStatus, RunStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Polls a run's status and raises the attempt's cancellation token when
/// the run is cancelled.
///
/// The watcher exits on its own once the run reaches any terminal state;
/// the attempt finalizer aborts it regardless so it can never outlive
/// the attempt.
pub struct CancellationWatcher;

impl CancellationWatcher {
    /// Spawns the watcher task.
    pub fn spawn(
        store: Arc<dyn RunStore>,
        run_id: RunId,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match store.get_run(run_id).await {
                    Ok(Some(run)) => {
                        if run.status == RunStatus::Cancelled {
                            tracing::debug!(run_id = %run_id, "cancellation observed");
                            token.cancel();
                            break;
                        }
                        if run.status.is_terminal() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(run_id = %run_id, error = %e, "cancellation poll failed");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runforge_journal::InMemoryJournal;
    use runforge_store::{CreateRunParams, InMemoryRunStore};
    use runforge_core::ProjectId;

    async fn seeded_store() -> (Arc<dyn RunStore>, RunId) {
        let store = InMemoryRunStore::new(InMemoryJournal::new());
        let (run, _) = store
            .create_run(CreateRunParams::new(ProjectId::new(), "watch me"))
            .await
            .unwrap();
        (Arc::new(store), run.id)
    }

    #[tokio::test(start_paused = true)]
    async fn raises_token_when_run_is_cancelled() {
        let (store, run_id) = seeded_store().await;
        let token = CancellationToken::new();
        let watcher = CancellationWatcher::spawn(
            Arc::clone(&store),
            run_id,
            Duration::from_millis(50),
            token.clone(),
        );

        store.cancel_run(run_id).await.unwrap();
        token.cancelled().await;
        watcher.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn exits_quietly_on_other_terminal_states() {
        let (store, run_id) = seeded_store().await;
        let token = CancellationToken::new();
        let watcher = CancellationWatcher::spawn(
            Arc::clone(&store),
            run_id,
            Duration::from_millis(50),
            token.clone(),
        );

        store.claim_run_for_execution(run_id).await.unwrap();
        store
            .update_run_status(run_id, RunStatus::Running)
            .await
            .unwrap();
        store
            .complete_run(run_id, "done", runforge_store::CompletionMeta::default())
            .await
            .unwrap();

        watcher.await.unwrap();
        assert!(!token.is_cancelled());
    }
}
