//! Resilience primitives for calling an unreliable remote dependency.
//!
//! - **Clock / Sleeper**: injectable time so cooldowns, TTLs and backoff can
//!   be driven deterministically in tests
//! - **Circuit Breaker**: stops attempting a dependency after consecutive
//!   failures and probes it again after a cooldown
//! - **Retry**: a bounded, fixed-schedule retry loop with per-attempt
//!   timeouts and cooperative cancellation, gated by the breaker
//!
//! ```ignore
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::default())?;
//! let executor = RetryExecutor::new(RetryConfig::default());
//! let outcome = executor.execute(&breaker, &cancel, |_| client.call(&query)).await;
//! ```

pub mod circuit_breaker;
pub mod clock;
pub mod retry;

pub use circuit_breaker::{
    AttemptPermit, CircuitBreaker, CircuitBreakerBuilderWithClock, CircuitBreakerConfig,
    CircuitBreakerConfigBuilder, CircuitBreakerMetrics, CircuitState, ConfigError, ConfigResult,
};
pub use clock::{Clock, MockClock, Sleeper, SystemClock, TokioSleeper};
pub use retry::{AttemptError, RetryConfig, RetryConfigBuilder, RetryError, RetryExecutor, RetryOutcome};
