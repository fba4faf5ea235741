//! NATS integration for the queue bus and artifact bucket.
//!
//! - Run requests travel through a JetStream work-queue stream, so each
//!   message is delivered to one worker at a time and redelivered until
//!   acknowledged (at-least-once).
//! - Artifacts land in a NATS Object Store bucket keyed per run.

use crate::bus::{Acker, QueueBus, QueueDelivery, QueueSubscription, RunRequested};
use crate::envelope::Envelope;
use crate::error::{ArtifactStoreError, QueueError};
use async_nats::jetstream;
use async_nats::jetstream::object_store;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;

/// Subject for run requests.
const RUNS_SUBJECT: &str = "runforge.runs.requested";

/// Stream name for run requests.
const RUNS_STREAM_NAME: &str = "RUNFORGE_RUNS";

/// Durable consumer shared by the worker pool.
const WORKERS_CONSUMER_NAME: &str = "runforge-workers";

/// Object store bucket name for artifacts.
const ARTIFACTS_BUCKET_NAME: &str = "runforge-artifacts";

/// Configuration for NATS-backed infrastructure.
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URL.
    pub url: String,
    /// Stream name for run requests (defaults to RUNFORGE_RUNS).
    pub runs_stream_name: Option<String>,
    /// Object store bucket name (defaults to runforge-artifacts).
    pub artifacts_bucket_name: Option<String>,
}

impl NatsConfig {
    /// Creates a new config with the given NATS URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            runs_stream_name: None,
            artifacts_bucket_name: None,
        }
    }

    fn runs_stream(&self) -> &str {
        self.runs_stream_name.as_deref().unwrap_or(RUNS_STREAM_NAME)
    }

    fn artifacts_bucket(&self) -> &str {
        self.artifacts_bucket_name
            .as_deref()
            .unwrap_or(ARTIFACTS_BUCKET_NAME)
    }
}

/// NATS JetStream-based queue bus.
pub struct NatsQueueBus {
    jetstream: Arc<jetstream::Context>,
    config: NatsConfig,
}

impl NatsQueueBus {
    /// Creates a new bus, connecting and ensuring the stream exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or stream setup fails.
    pub async fn new(config: NatsConfig) -> Result<Self, QueueError> {
        let client = async_nats::connect(&config.url).await.map_err(|e| {
            QueueError::ConnectionFailed {
                message: e.to_string(),
            }
        })?;

        let jetstream = async_nats::jetstream::new(client);

        let stream_config = jetstream::stream::Config {
            name: config.runs_stream().to_string(),
            subjects: vec![RUNS_SUBJECT.to_string()],
            storage: jetstream::stream::StorageType::File,
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };

        jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("failed to create runs stream: {e}"),
            })?;

        Ok(Self {
            jetstream: Arc::new(jetstream),
            config,
        })
    }
}

struct NatsAcker {
    message: jetstream::Message,
}

#[async_trait]
impl Acker for NatsAcker {
    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        self.message
            .ack()
            .await
            .map_err(|e| QueueError::ReceiveFailed {
                message: format!("failed to ack message: {e}"),
            })
    }
}

struct NatsSubscription {
    messages: jetstream::consumer::pull::Stream,
}

#[async_trait]
impl QueueSubscription for NatsSubscription {
    async fn next(&mut self) -> Result<Option<QueueDelivery>, QueueError> {
        loop {
            let Some(message) = self.messages.next().await else {
                return Ok(None);
            };
            let message = message.map_err(|e| QueueError::ReceiveFailed {
                message: e.to_string(),
            })?;

            match Envelope::<RunRequested>::from_json_bytes(&message.payload) {
                Ok(envelope) => {
                    let request = envelope.into_payload();
                    return Ok(Some(QueueDelivery::new(
                        request,
                        Box::new(NatsAcker { message }),
                    )));
                }
                Err(_) => {
                    // A malformed message would redeliver forever; drop it.
                    message.ack().await.ok();
                }
            }
        }
    }
}

#[async_trait]
impl QueueBus for NatsQueueBus {
    async fn publish(&self, message: RunRequested) -> Result<(), QueueError> {
        let bytes = Envelope::new(message).to_json_bytes().map_err(|e| {
            QueueError::PublishFailed {
                message: format!("failed to serialize run request: {e}"),
            }
        })?;

        self.jetstream
            .publish(RUNS_SUBJECT, bytes.into())
            .await
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })?
            .await
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn subscribe(&self) -> Result<Box<dyn QueueSubscription>, QueueError> {
        let stream = self
            .jetstream
            .get_stream(self.config.runs_stream())
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("failed to get stream: {e}"),
            })?;

        let consumer_config = jetstream::consumer::pull::Config {
            durable_name: Some(WORKERS_CONSUMER_NAME.to_string()),
            ..Default::default()
        };

        let consumer = stream
            .get_or_create_consumer(WORKERS_CONSUMER_NAME, consumer_config)
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("failed to create consumer: {e}"),
            })?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| QueueError::ReceiveFailed {
                message: format!("failed to open message stream: {e}"),
            })?;

        Ok(Box::new(NatsSubscription { messages }))
    }
}

/// NATS Object Store-based artifact storage.
///
/// Keys are caller-supplied (e.g. `runs/{run_id}/workspace.zip`), so a
/// re-run replaces its own snapshot in place.
pub struct NatsArtifactStore {
    store: object_store::ObjectStore,
}

impl NatsArtifactStore {
    /// Creates a new artifact store, ensuring the bucket exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or bucket setup fails.
    pub async fn new(config: &NatsConfig) -> Result<Self, ArtifactStoreError> {
        let client = async_nats::connect(&config.url).await.map_err(|e| {
            ArtifactStoreError::StoreFailed {
                message: format!("failed to connect: {e}"),
            }
        })?;

        let jetstream = async_nats::jetstream::new(client);

        let store = jetstream
            .create_object_store(object_store::Config {
                bucket: config.artifacts_bucket().to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| ArtifactStoreError::StoreFailed {
                message: format!("failed to create object store: {e}"),
            })?;

        Ok(Self { store })
    }
}

#[async_trait]
impl crate::artifact_store::ArtifactStore for NatsArtifactStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<(), ArtifactStoreError> {
        self.store
            .put(key, &mut std::io::Cursor::new(bytes))
            .await
            .map_err(|e| ArtifactStoreError::StoreFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ArtifactStoreError> {
        let mut result = match self.store.get(key).await {
            Ok(object) => object,
            Err(e) if e.to_string().contains("not found") => return Ok(None),
            Err(e) => {
                return Err(ArtifactStoreError::RetrieveFailed {
                    message: e.to_string(),
                });
            }
        };

        use tokio::io::AsyncReadExt;
        let mut data = Vec::new();
        result
            .read_to_end(&mut data)
            .await
            .map_err(|e| ArtifactStoreError::RetrieveFailed {
                message: e.to_string(),
            })?;

        Ok(Some(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nats_config_defaults() {
        let config = NatsConfig::new("nats://localhost:4222");
        assert_eq!(config.runs_stream(), RUNS_STREAM_NAME);
        assert_eq!(config.artifacts_bucket(), ARTIFACTS_BUCKET_NAME);
    }

    #[test]
    fn nats_config_custom() {
        let config = NatsConfig {
            url: "nats://localhost:4222".to_string(),
            runs_stream_name: Some("CUSTOM_RUNS".to_string()),
            artifacts_bucket_name: Some("custom-artifacts".to_string()),
        };
        assert_eq!(config.runs_stream(), "CUSTOM_RUNS");
        assert_eq!(config.artifacts_bucket(), "custom-artifacts");
    }
}
