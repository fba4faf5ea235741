//! The worker pool: one logical worker per in-flight delivery.

use crate::supervisor::RunSupervisor;
use rand::Rng;
use runforge_queue::QueueBus;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Consumes bus deliveries with a fixed number of concurrent workers.
///
/// Deliveries are acknowledged after `process` returns, so a worker that
/// dies mid-attempt leaves the message unacked for redelivery (on top of
/// the stale-running scheduler reclaiming the claim itself).
pub struct WorkerPool {
    supervisor: Arc<RunSupervisor>,
    bus: Arc<dyn QueueBus>,
    concurrency: usize,
}

impl WorkerPool {
    /// Creates a pool.
    #[must_use]
    pub fn new(
        supervisor: Arc<RunSupervisor>,
        bus: Arc<dyn QueueBus>,
        concurrency: usize,
    ) -> Self {
        Self {
            supervisor,
            bus,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs the pool until shutdown is requested and every worker has
    /// finished its in-flight delivery.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut workers = Vec::with_capacity(self.concurrency);
        for worker in 0..self.concurrency {
            let supervisor = Arc::clone(&self.supervisor);
            let bus = Arc::clone(&self.bus);
            let shutdown = shutdown.clone();
            workers.push(tokio::spawn(async move {
                let mut subscription = match bus.subscribe().await {
                    Ok(subscription) => subscription,
                    Err(e) => {
                        tracing::error!(worker, error = %e, "subscription failed, worker exiting");
                        return;
                    }
                };
                loop {
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        delivery = subscription.next() => match delivery {
                            Ok(Some(delivery)) => {
                                let run_id = delivery.message.run_id;
                                if let Err(e) = supervisor.process(run_id).await {
                                    tracing::error!(worker, run_id = %run_id, error = %e, "run processing failed");
                                }
                                if let Err(e) = delivery.ack().await {
                                    tracing::warn!(worker, run_id = %run_id, error = %e, "ack failed");
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                tracing::warn!(worker, error = %e, "delivery failed, backing off");
                                let backoff = rand::thread_rng().gen_range(500..1500);
                                tokio::time::sleep(Duration::from_millis(backoff)).await;
                            }
                        }
                    }
                }
            }));
        }
        for worker in workers {
            worker.await.ok();
        }
    }
}
