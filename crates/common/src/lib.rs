//! Resilience building blocks shared across OncoVista crates.
//!
//! Nothing in this crate knows about treatment recommendations. It provides
//! the generic pieces the retrieval engine is assembled from.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: collections and canonical key helpers
//! - `runtime`: async infrastructure (clock, circuit breaker, retry, cache)
//! - `test-utils`: deterministic sleepers and stores for tests
//! - `observability`: tracing (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod collections;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(all(feature = "runtime", any(feature = "test-utils", test)))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use cache::{
    canonical_key, AdaptiveCache, CacheEntry, CacheError, CacheResult, CacheStats, KeyValueStore,
    MemoryStore, StoreError, TtlPolicy,
};
#[cfg(feature = "foundation")]
pub use collections::RingBuffer;
#[cfg(feature = "runtime")]
pub use resilience::{
    AttemptError, AttemptPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitBreakerMetrics, CircuitState, Clock, ConfigError, MockClock, RetryConfig,
    RetryConfigBuilder, RetryError, RetryExecutor, RetryOutcome, Sleeper, SystemClock,
    TokioSleeper,
};
