//! Persistent key-value store boundary.
//!
//! The adaptive cache is the only component that talks to a store. Stores
//! deal in opaque bytes; expiry bookkeeping happens in the cache, so the TTL
//! passed to [`KeyValueStore::set`] is only a hint a backend may use for its
//! own housekeeping.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Failures reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Opaque get/set/delete by string key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl_hint: Duration) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_hint: Duration) -> Result<(), StoreError> {
        (**self).set(key, value, ttl_hint).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

/// Process-local store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, _ttl_hint: Duration) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}
