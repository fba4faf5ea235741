//! Keyed artifact storage.

use crate::error::ArtifactStoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Keyed blob storage for run artifacts.
///
/// Keys are opaque strings; writes are idempotent by key replacement.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores bytes under a key, replacing any previous value.
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), ArtifactStoreError>;

    /// Retrieves bytes by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ArtifactStoreError>;
}

/// In-memory [`ArtifactStore`] implementation.
#[derive(Clone, Default)]
pub struct InMemoryArtifactStore {
    data: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded content type for a key, if present.
    #[must_use]
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), ArtifactStoreError> {
        self.data
            .lock()
            .insert(key.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ArtifactStoreError> {
        Ok(self.data.lock().get(key).map(|(bytes, _)| bytes.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryArtifactStore::new();
        store
            .put("runs/x/workspace.zip", b"zip bytes", "application/zip")
            .await
            .unwrap();

        let bytes = store.get("runs/x/workspace.zip").await.unwrap().unwrap();
        assert_eq!(bytes, b"zip bytes");
        assert_eq!(
            store.content_type("runs/x/workspace.zip").as_deref(),
            Some("application/zip")
        );
    }

    #[tokio::test]
    async fn put_replaces_by_key() {
        let store = InMemoryArtifactStore::new();
        store.put("k", b"first", "text/plain").await.unwrap();
        store.put("k", b"second", "text/plain").await.unwrap();

        assert_eq!(store.get("k").await.unwrap().unwrap(), b"second");
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = InMemoryArtifactStore::new();
        assert!(store.get("absent").await.unwrap().is_none());
    }
}
