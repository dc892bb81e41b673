//! Confidence-aware response caching.
//!
//! - [`KeyValueStore`]: the opaque byte store the cache persists through
//! - [`TtlPolicy`]: maps result confidence to entry lifetime
//! - [`AdaptiveCache`]: typed entries with lazy expiry and periodic sweeps
//! - [`canonical_key`]: order-independent key derivation
//!
//! ```ignore
//! let cache: AdaptiveCache<Recommendation> =
//!     AdaptiveCache::new(Arc::new(MemoryStore::new()), TtlPolicy::default());
//! cache.set(&key, &recommendation, 0.92).await?;   // lives 4h
//! let hit = cache.get(&key).await?;
//! ```

pub mod adaptive;
pub mod policy;
pub mod stats;
pub mod store;

pub use adaptive::{canonical_key, AdaptiveCache, CacheEntry, CacheError, CacheResult, ENTRY_VERSION};
pub use policy::TtlPolicy;
pub use stats::CacheStats;
pub use store::{KeyValueStore, MemoryStore, StoreError};
