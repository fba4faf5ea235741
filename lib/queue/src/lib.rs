//! Queue bus and artifact bucket plumbing for the runforge platform.
//!
//! The bus delivers `RunRequested` messages to the worker pool with
//! at-least-once semantics; the artifact store holds workspace snapshots
//! keyed per run. Production uses NATS (JetStream + Object Store); tests
//! use the in-memory implementations.

pub mod artifact_store;
pub mod bus;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod nats;

pub use artifact_store::{ArtifactStore, InMemoryArtifactStore};
pub use bus::{Acker, QueueBus, QueueDelivery, QueueSubscription, RunRequested};
pub use envelope::{CURRENT_VERSION, Envelope};
pub use error::{ArtifactStoreError, QueueError};
pub use memory::InMemoryQueueBus;
pub use nats::{NatsArtifactStore, NatsConfig, NatsQueueBus};
