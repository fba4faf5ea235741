//! In-memory queue bus for tests and single-process setups.

use crate::bus::{Acker, QueueBus, QueueDelivery, QueueSubscription, RunRequested};
use crate::error::QueueError;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};

struct NoopAcker;

#[async_trait]
impl Acker for NoopAcker {
    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        Ok(())
    }
}

/// In-memory [`QueueBus`] implementation.
///
/// All subscriptions share a single receiver, so each message reaches
/// exactly one subscriber, mirroring work-queue delivery. Redelivery is
/// not simulated; tests exercise duplicate tolerance by publishing twice.
#[derive(Clone)]
pub struct InMemoryQueueBus {
    tx: mpsc::UnboundedSender<RunRequested>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<RunRequested>>>,
    published: Arc<AtomicUsize>,
}

impl InMemoryQueueBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            published: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of messages published so far.
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryQueueBus {
    fn default() -> Self {
        Self::new()
    }
}

struct InMemorySubscription {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<RunRequested>>>,
}

#[async_trait]
impl QueueSubscription for InMemorySubscription {
    async fn next(&mut self) -> Result<Option<QueueDelivery>, QueueError> {
        let message = self.rx.lock().await.recv().await;
        Ok(message.map(|m| QueueDelivery::new(m, Box::new(NoopAcker))))
    }
}

#[async_trait]
impl QueueBus for InMemoryQueueBus {
    async fn publish(&self, message: RunRequested) -> Result<(), QueueError> {
        self.published.fetch_add(1, Ordering::SeqCst);
        self.tx
            .send(message)
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })
    }

    async fn subscribe(&self) -> Result<Box<dyn QueueSubscription>, QueueError> {
        Ok(Box::new(InMemorySubscription {
            rx: Arc::clone(&self.rx),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runforge_core::RunId;

    #[tokio::test]
    async fn publish_then_receive() {
        let bus = InMemoryQueueBus::new();
        let run_id = RunId::new();
        bus.publish(RunRequested { run_id }).await.unwrap();

        let mut sub = bus.subscribe().await.unwrap();
        let delivery = sub.next().await.unwrap().unwrap();
        assert_eq!(delivery.message.run_id, run_id);
        delivery.ack().await.unwrap();
    }

    #[tokio::test]
    async fn each_message_reaches_one_subscriber() {
        let bus = InMemoryQueueBus::new();
        for _ in 0..4 {
            bus.publish(RunRequested { run_id: RunId::new() })
                .await
                .unwrap();
        }

        let mut sub_a = bus.subscribe().await.unwrap();
        let mut sub_b = bus.subscribe().await.unwrap();
        let mut received = 0;
        for _ in 0..2 {
            assert!(sub_a.next().await.unwrap().is_some());
            received += 1;
            assert!(sub_b.next().await.unwrap().is_some());
            received += 1;
        }
        assert_eq!(received, 4);
        assert_eq!(bus.published_count(), 4);
    }
}
