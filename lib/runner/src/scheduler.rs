//! Periodic reconciliation between durable job state and the queue bus.
//!
//! Two independent tasks, each idempotent because republishing an
//! already-running run is absorbed by the claim compare-and-set:
//!
//! - **Requeue-stale-running** reclaims jobs whose worker died
//!   mid-attempt without releasing the claim.
//! - **Kick-queued** re-publishes queued jobs whose delivery was lost.

use crate::config::WorkerConfig;
use crate::error::RunnerError;
use rand::Rng;
use runforge_core::RunId;
use runforge_queue::{QueueBus, RunRequested};
use runforge_store::{RunStatus, RunStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One requeue-stale-running pass. Returns the reclaimed run ids.
pub async fn requeue_stale_once(
    store: &Arc<dyn RunStore>,
    bus: &Arc<dyn QueueBus>,
    stale_seconds: i64,
) -> Result<Vec<RunId>, RunnerError> {
    let run_ids = store.requeue_stale_running_jobs(stale_seconds).await?;
    for run_id in &run_ids {
        // revert the run's own status so the next claim can promote it
        if let Err(e) = store.update_run_status(*run_id, RunStatus::Queued).await {
            tracing::warn!(run_id = %run_id, error = %e, "stale run status revert failed");
        }
        bus.publish(RunRequested { run_id: *run_id }).await?;
        tracing::info!(run_id = %run_id, "requeued stale running job");
    }
    Ok(run_ids)
}

/// One kick-queued pass. Returns the re-published run ids.
pub async fn kick_queued_once(
    store: &Arc<dyn RunStore>,
    bus: &Arc<dyn QueueBus>,
    limit: i64,
    min_age_seconds: i64,
) -> Result<Vec<RunId>, RunnerError> {
    let run_ids = store
        .list_runnable_queued_job_run_ids(limit, min_age_seconds)
        .await?;
    for run_id in &run_ids {
        bus.publish(RunRequested { run_id: *run_id }).await?;
        tracing::debug!(run_id = %run_id, "kicked queued job");
    }
    Ok(run_ids)
}

fn jittered(interval: Duration) -> Duration {
    let jitter_cap = (interval.as_millis() / 10).max(1) as u64;
    let jitter = rand::thread_rng().gen_range(0..jitter_cap);
    interval + Duration::from_millis(jitter)
}

/// Runs the requeue-stale-running scheduler until shutdown.
///
/// A threshold of 0 disables reclamation; the loop still ticks so the
/// knob can stay a plain config value.
pub async fn run_requeue_stale_loop(
    store: Arc<dyn RunStore>,
    bus: Arc<dyn QueueBus>,
    config: WorkerConfig,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(jittered(config.scheduler_interval)) => {}
        }
        if config.requeue_stale_after_seconds <= 0 {
            continue;
        }
        if let Err(e) =
            requeue_stale_once(&store, &bus, config.requeue_stale_after_seconds).await
        {
            tracing::warn!(error = %e, "requeue-stale pass failed");
        }
    }
}

/// Runs the kick-queued scheduler until shutdown.
pub async fn run_kick_queued_loop(
    store: Arc<dyn RunStore>,
    bus: Arc<dyn QueueBus>,
    config: WorkerConfig,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(jittered(config.scheduler_interval)) => {}
        }
        if let Err(e) = kick_queued_once(
            &store,
            &bus,
            config.kick_queued_limit,
            config.kick_queued_min_age_seconds,
        )
        .await
        {
            tracing::warn!(error = %e, "kick-queued pass failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runforge_core::ProjectId;
    use runforge_journal::InMemoryJournal;
    use runforge_queue::InMemoryQueueBus;
    use runforge_store::{CreateRunParams, InMemoryRunStore, JobStatus};

    struct Harness {
        store_mem: InMemoryRunStore,
        store: Arc<dyn RunStore>,
        bus_mem: InMemoryQueueBus,
        bus: Arc<dyn QueueBus>,
    }

    impl Harness {
        fn new() -> Self {
            let store_mem = InMemoryRunStore::new(InMemoryJournal::new());
            let bus_mem = InMemoryQueueBus::new();
            Self {
                store: Arc::new(store_mem.clone()),
                store_mem,
                bus: Arc::new(bus_mem.clone()),
                bus_mem,
            }
        }
    }

    #[tokio::test]
    async fn requeue_stale_reverts_run_and_republishes() {
        let h = Harness::new();
        let (run, _) = h
            .store
            .create_run(CreateRunParams::new(ProjectId::new(), "stale"))
            .await
            .unwrap();
        h.store.claim_run_for_execution(run.id).await.unwrap();
        h.store
            .update_run_status(run.id, RunStatus::Running)
            .await
            .unwrap();
        h.store_mem.backdate_job(run.id, 600);

        let requeued = requeue_stale_once(&h.store, &h.bus, 300).await.unwrap();
        assert_eq!(requeued, vec![run.id]);

        let run = h.store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Queued);
        let job = h.store.get_job(run.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(h.bus_mem.published_count(), 1);
    }

    #[tokio::test]
    async fn requeue_stale_leaves_live_claims() {
        let h = Harness::new();
        let (run, _) = h
            .store
            .create_run(CreateRunParams::new(ProjectId::new(), "live"))
            .await
            .unwrap();
        h.store.claim_run_for_execution(run.id).await.unwrap();

        let requeued = requeue_stale_once(&h.store, &h.bus, 300).await.unwrap();
        assert!(requeued.is_empty());
        assert_eq!(h.bus_mem.published_count(), 0);
    }

    #[tokio::test]
    async fn kick_queued_republishes_aged_jobs() {
        let h = Harness::new();
        let (aged, _) = h
            .store
            .create_run(CreateRunParams::new(ProjectId::new(), "aged"))
            .await
            .unwrap();
        let (_fresh, _) = h
            .store
            .create_run(CreateRunParams::new(ProjectId::new(), "fresh"))
            .await
            .unwrap();
        h.store_mem.backdate_job(aged.id, 120);

        let kicked = kick_queued_once(&h.store, &h.bus, 10, 30).await.unwrap();
        assert_eq!(kicked, vec![aged.id]);
        assert_eq!(h.bus_mem.published_count(), 1);
    }
}
