//! Integration tests for the adaptive cache
//!
//! Exercises TTL tiers, sweeping and concurrent writers through the public
//! API only.

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::time::Duration;

use oncovista_common::cache::{canonical_key, AdaptiveCache, MemoryStore, TtlPolicy};
use oncovista_common::resilience::MockClock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Summary {
    protocol: String,
    score: f64,
}

fn summary(protocol: &str) -> Summary {
    Summary { protocol: protocol.to_string(), score: 0.9 }
}

/// Validates each confidence tier against its lifetime.
///
/// # Test Steps
/// 1. Store entries at 0.95, 0.85, 0.75 and 0.2 confidence
/// 2. Advance the clock across each tier boundary
/// 3. Confirm entries disappear in tier order
#[tokio::test]
async fn test_entries_expire_in_tier_order() {
    let clock = MockClock::new();
    let cache: AdaptiveCache<Summary, MockClock> =
        AdaptiveCache::with_clock(Arc::new(MemoryStore::new()), TtlPolicy::default(), clock.clone());

    for (key, confidence) in [("a", 0.95), ("b", 0.85), ("c", 0.75), ("d", 0.2)] {
        cache.set(key, &summary(key), confidence).await.expect("set");
    }

    let live = |keys: &'static [&'static str]| {
        let cache = &cache;
        async move {
            let mut found = Vec::new();
            for key in keys {
                if cache.get(key).await.expect("get").is_some() {
                    found.push(*key);
                }
            }
            found
        }
    };

    clock.advance(Duration::from_secs(31 * 60));
    assert_eq!(live(&["a", "b", "c", "d"]).await, vec!["a", "b", "c"]);
    clock.advance(Duration::from_secs(30 * 60));
    assert_eq!(live(&["a", "b", "c"]).await, vec!["a", "b"]);
    clock.advance(Duration::from_secs(60 * 60));
    assert_eq!(live(&["a", "b"]).await, vec!["a"]);
    clock.advance(Duration::from_secs(2 * 60 * 60));
    assert!(live(&["a"]).await.is_empty());
}

/// Validates that sweeping bounds the store without reads.
///
/// # Test Steps
/// 1. Write 50 short-lived entries that are never read again
/// 2. Advance past their lifetime and sweep
/// 3. Confirm the store is empty
#[tokio::test]
async fn test_sweep_reclaims_abandoned_keys() {
    let store = MemoryStore::new();
    let clock = MockClock::new();
    let cache: AdaptiveCache<Summary, MockClock> =
        AdaptiveCache::with_clock(Arc::new(store.clone()), TtlPolicy::default(), clock.clone());

    for i in 0..50 {
        cache.set(&format!("k{i}"), &summary("x"), 0.1).await.expect("set");
    }
    assert_eq!(store.len(), 50);

    clock.advance(Duration::from_secs(31 * 60));
    assert_eq!(cache.sweep().await, 50);
    assert!(store.is_empty());
    assert_eq!(cache.stats().expirations, 50);
}

/// Validates that concurrent writers to one key leave exactly one readable
/// entry.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_last_write_wins() {
    let cache: Arc<AdaptiveCache<Summary>> =
        Arc::new(AdaptiveCache::new(Arc::new(MemoryStore::new()), TtlPolicy::default()));

    let mut handles = Vec::new();
    for i in 0..16 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache.set("shared", &summary(&format!("p{i}")), 0.9).await.expect("set");
        }));
    }
    for handle in handles {
        handle.await.expect("join");
    }

    let entry = cache.get("shared").await.expect("get").expect("present");
    assert!(entry.value.protocol.starts_with('p'));
    assert_eq!(cache.stats().inserts, 16);
}

#[test]
fn test_canonical_key_is_stable() {
    let key = canonical_key("ns", &summary("FOLFOX")).expect("key");
    assert_eq!(key, canonical_key("ns", &summary("FOLFOX")).expect("key"));
    assert_eq!(key.len(), "ns:".len() + 64);
}
