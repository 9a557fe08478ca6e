use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no document or record for {key}")]
    NotFound { key: String },
    /// I/O or lock failure below the store.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
    /// A document that is not valid JSON for its type.
    #[error("codec failure: {reason}")]
    Codec { reason: String },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Codec {
            reason: err.to_string(),
        }
    }
}

/// Whole-document byte storage keyed by name (`tasks`, `history`, `session`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Replaces the document under `key`.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    /// `StoreError::NotFound` when nothing was stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    /// Removing an absent document is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Documents kept in a shared map; clones see the same documents.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    documents: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
        self.documents.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.documents()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.documents()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.documents()?.remove(key);
        Ok(())
    }
}
