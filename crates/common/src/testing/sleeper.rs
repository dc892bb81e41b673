//! Deterministic sleeper for backoff tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::resilience::{MockClock, Sleeper};

/// Records every requested delay and returns immediately.
///
/// When built with a [`MockClock`] the clock is advanced by each delay, so
/// components reading time (breaker cooldowns, cache expiry) observe the
/// backoff as if it had really elapsed. Clones share the recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
    clock: Option<MockClock>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeper that advances `clock` by each requested delay.
    pub fn with_clock(clock: MockClock) -> Self {
        Self { delays: Arc::default(), clock: Some(clock) }
    }

    /// Delays requested so far, in order.
    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    /// Sum of all requested delays.
    pub fn total(&self) -> Duration {
        self.delays.lock().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
        if let Some(clock) = &self.clock {
            clock.advance(duration);
        }
        tokio::task::yield_now().await;
    }
}
