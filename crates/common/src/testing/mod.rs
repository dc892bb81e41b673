//! Testing utilities and helpers
//!
//! - **[`assertions`]**: float and duration assertions
//! - **[`mocks`]**: key-value stores with injectable failures
//! - **[`sleeper`]**: a sleeper that records requested delays instead of
//!   waiting, optionally advancing a [`MockClock`](crate::resilience::MockClock)
//!
//! ```ignore
//! let clock = MockClock::new();
//! let sleeper = RecordingSleeper::with_clock(clock.clone());
//! let executor = RetryExecutor::with_sleeper(RetryConfig::default(), sleeper.clone());
//! // ... run the executor, then inspect sleeper.recorded()
//! ```

pub mod assertions;
pub mod mocks;
pub mod sleeper;

pub use assertions::{assert_approx_eq, assert_duration_in_range};
pub use mocks::FlakyStore;
pub use sleeper::RecordingSleeper;
