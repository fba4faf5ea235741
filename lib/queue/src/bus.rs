//! The at-least-once queue bus contract.

use crate::error::QueueError;
use async_trait::async_trait;
use runforge_core::RunId;
use serde::{Deserialize, Serialize};

/// The message a worker receives when a run should be (re)considered for
/// execution.
///
/// The bus is not the source of truth for what should run: duplicates and
/// arbitrarily delayed deliveries are expected, and the claim
/// compare-and-set in the store absorbs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequested {
    /// The run to consider.
    pub run_id: RunId,
}

/// Acknowledges a delivery back to the bus.
#[async_trait]
pub trait Acker: Send {
    /// Acknowledges the delivery. Unacked deliveries are redelivered.
    async fn ack(self: Box<Self>) -> Result<(), QueueError>;
}

/// A single delivery from the bus.
pub struct QueueDelivery {
    /// The delivered message.
    pub message: RunRequested,
    acker: Box<dyn Acker>,
}

impl QueueDelivery {
    /// Wraps a message with its acknowledgement handle.
    #[must_use]
    pub fn new(message: RunRequested, acker: Box<dyn Acker>) -> Self {
        Self { message, acker }
    }

    /// Acknowledges the delivery after processing.
    pub async fn ack(self) -> Result<(), QueueError> {
        self.acker.ack().await
    }
}

/// An active subscription delivering messages to one worker at a time.
#[async_trait]
pub trait QueueSubscription: Send {
    /// Waits for the next delivery. `None` means the subscription closed.
    async fn next(&mut self) -> Result<Option<QueueDelivery>, QueueError>;
}

/// At-least-once topic delivering [`RunRequested`] to a worker pool.
///
/// Each published message reaches at most one worker at a time but at
/// least once overall. No ordering is guaranteed.
#[async_trait]
pub trait QueueBus: Send + Sync {
    /// Publishes a message to the topic.
    async fn publish(&self, message: RunRequested) -> Result<(), QueueError>;

    /// Opens a subscription. Subscriptions share the topic's deliveries:
    /// each message goes to exactly one live subscription at a time.
    async fn subscribe(&self) -> Result<Box<dyn QueueSubscription>, QueueError>;
}
