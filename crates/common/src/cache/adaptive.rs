//! Adaptive-TTL response cache over a [`KeyValueStore`].
//!
//! Entries are JSON documents carrying their own `stored_at`/`expires_at`
//! stamps, so expiry holds even when the backing store ignores TTL hints.
//! Expired entries are treated as absent on read and removed lazily; a
//! periodic [`sweep`](AdaptiveCache::sweep) removes the ones nobody reads
//! again. Writes are last-write-wins and serialized through one lock so a
//! lazy eviction can never delete an entry that was just rewritten.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::policy::TtlPolicy;
use super::stats::{CacheStats, MetricsCollector};
use super::store::{KeyValueStore, StoreError};
use crate::resilience::{Clock, SystemClock};

/// Format version stamped on every entry. Entries with another version are
/// treated as absent.
pub const ENTRY_VERSION: &str = "1.0";

/// Cache failures. Callers on the retrieval path log these and carry on.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid TTL policy: {0}")]
    InvalidPolicy(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// A stored value with its provenance and lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    /// Confidence of the value when it was stored.
    pub confidence: f64,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub version: String,
    /// Written as a long-lived offline fallback rather than a fresh result.
    #[serde(default)]
    pub last_known_good: bool,
}

impl<V> CacheEntry<V> {
    /// An entry is expired once `now` is strictly past `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn ttl(&self) -> TimeDelta {
        self.expires_at - self.stored_at
    }
}

/// The part of an entry needed to decide whether it is stale.
#[derive(Deserialize)]
struct EntryHeader {
    expires_at: DateTime<Utc>,
    version: String,
}

/// Derive a cache key from any serializable value.
///
/// Object keys are sorted recursively before hashing, so two values with the
/// same fields produce the same key whatever order the fields were set in.
/// The result is `"{namespace}:{blake3 hex}"`.
pub fn canonical_key<T: Serialize + ?Sized>(namespace: &str, value: &T) -> CacheResult<String> {
    let canonical = sort_keys(serde_json::to_value(value)?);
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(format!("{namespace}:{}", hex::encode(blake3::hash(&bytes).as_bytes())))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect::<Map<_, _>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Confidence-aware cache of serializable values.
pub struct AdaptiveCache<V, C: Clock = SystemClock> {
    store: Arc<dyn KeyValueStore>,
    policy: TtlPolicy,
    clock: Arc<C>,
    index: DashMap<String, DateTime<Utc>>,
    write_lock: Mutex<()>,
    metrics: MetricsCollector,
    _value: PhantomData<fn() -> V>,
}

impl<V, C: Clock> fmt::Debug for AdaptiveCache<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveCache")
            .field("policy", &self.policy)
            .field("tracked", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl<V> AdaptiveCache<V, SystemClock>
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    /// Cache on the system clock.
    pub fn new(store: Arc<dyn KeyValueStore>, policy: TtlPolicy) -> Self {
        Self::with_clock(store, policy, SystemClock)
    }
}

impl<V, C> AdaptiveCache<V, C>
where
    V: Serialize + DeserializeOwned + Send + Sync,
    C: Clock,
{
    /// Cache with a custom clock (useful for testing)
    pub fn with_clock(store: Arc<dyn KeyValueStore>, policy: TtlPolicy, clock: C) -> Self {
        Self {
            store,
            policy,
            clock: Arc::new(clock),
            index: DashMap::new(),
            write_lock: Mutex::new(()),
            metrics: MetricsCollector::default(),
            _value: PhantomData,
        }
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Live entry for `key`, or `None` if absent, expired or unreadable.
    pub async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry<V>>> {
        let Some(bytes) = self.store.get(key).await? else {
            self.metrics.record_miss();
            return Ok(None);
        };

        let entry = match serde_json::from_slice::<CacheEntry<V>>(&bytes) {
            Ok(entry) if entry.version == ENTRY_VERSION => entry,
            Ok(entry) => {
                debug!(cache_key = key, version = %entry.version, "Ignoring cache entry with foreign version");
                self.remove_stale(key).await?;
                self.metrics.record_miss();
                return Ok(None);
            }
            Err(err) => {
                warn!(cache_key = key, error = %err, "Discarding unreadable cache entry");
                self.remove_stale(key).await?;
                self.metrics.record_miss();
                return Ok(None);
            }
        };

        if entry.is_expired(self.clock.utc_now()) {
            debug!(cache_key = key, expires_at = %entry.expires_at, "Cache entry expired");
            self.remove_stale(key).await?;
            self.metrics.record_miss();
            return Ok(None);
        }

        self.metrics.record_hit();
        Ok(Some(entry))
    }

    /// Store `value` with a TTL derived from `confidence`, replacing any
    /// existing entry. Returns the new expiry.
    pub async fn set(&self, key: &str, value: &V, confidence: f64) -> CacheResult<DateTime<Utc>> {
        let ttl = self.policy.ttl_for(confidence);
        self.write(key, value, confidence, ttl, false).await
    }

    /// Store `value` as the last-known-good fallback for `key`, living for the
    /// fixed last-known-good lifetime.
    pub async fn set_last_known_good(
        &self,
        key: &str,
        value: &V,
        confidence: f64,
    ) -> CacheResult<DateTime<Utc>> {
        let ttl = self.policy.last_known_good_ttl();
        self.write(key, value, confidence, ttl, true).await
    }

    /// Remove `key` unconditionally.
    pub async fn invalidate(&self, key: &str) -> CacheResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(key).await?;
        self.index.remove(key);
        self.metrics.record_invalidation();
        debug!(cache_key = key, "Cache entry invalidated");
        Ok(())
    }

    /// Remove every tracked entry that has expired. Returns how many were
    /// removed; per-key store failures are logged and skipped.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.utc_now();
        let candidates: Vec<String> = self
            .index
            .iter()
            .filter(|entry| now > *entry.value())
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in candidates {
            match self.remove_stale(&key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => warn!(cache_key = %key, error = %err, "Cache sweep failed to remove entry"),
            }
        }

        self.metrics.record_sweep();
        debug!(removed, tracked = self.index.len(), "Cache sweep complete");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.index.len())
    }

    async fn write(
        &self,
        key: &str,
        value: &V,
        confidence: f64,
        ttl: Duration,
        last_known_good: bool,
    ) -> CacheResult<DateTime<Utc>> {
        let confidence = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };
        let lifetime = TimeDelta::from_std(ttl)
            .map_err(|_| CacheError::InvalidPolicy(format!("TTL {ttl:?} is out of range")))?;
        let stored_at = self.clock.utc_now();
        let expires_at = stored_at + lifetime;

        let entry = CacheEntry {
            key: key.to_string(),
            value,
            confidence,
            stored_at,
            expires_at,
            version: ENTRY_VERSION.to_string(),
            last_known_good,
        };
        let bytes = serde_json::to_vec(&entry)?;

        let _guard = self.write_lock.lock().await;
        self.store.set(key, bytes, ttl).await?;
        self.index.insert(key.to_string(), expires_at);
        self.metrics.record_insert();
        debug!(cache_key = key, confidence, ttl_secs = ttl.as_secs(), last_known_good, "Cache entry stored");
        Ok(expires_at)
    }

    /// Delete `key` if, under the write lock, it is still stale. Returns
    /// whether an expired entry was removed.
    async fn remove_stale(&self, key: &str) -> CacheResult<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(bytes) = self.store.get(key).await? else {
            self.index.remove(key);
            return Ok(false);
        };

        let now = self.clock.utc_now();
        let (stale, expired) = match serde_json::from_slice::<EntryHeader>(&bytes) {
            Ok(header) if header.version == ENTRY_VERSION => {
                let expired = now > header.expires_at;
                (expired, expired)
            }
            _ => (true, false),
        };
        if !stale {
            return Ok(false);
        }

        self.store.delete(key).await?;
        self.index.remove(key);
        if expired {
            self.metrics.record_expirations(1);
        }
        Ok(expired)
    }
}
