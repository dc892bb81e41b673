//! Periodic removal of expired cache entries.
//!
//! Expired entries are already ignored on read; the sweep reclaims the space
//! they hold in the backing store. The scheduler owns one background task with
//! an explicit lifecycle: the join handle is tracked, cancellation goes through
//! a token, and stopping waits for the task under a timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use oncovista_infra::scheduling::{SchedulerResult, SweepScheduler, SweepSchedulerConfig};
//!
//! # async fn example(engine: oncovista_core::RecommendationEngine) -> SchedulerResult<()> {
//! let mut scheduler = SweepScheduler::new(
//!     engine.cache(),
//!     SweepSchedulerConfig { interval: Duration::from_secs(300), ..Default::default() },
//! );
//!
//! scheduler.start()?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use oncovista_common::{AdaptiveCache, Clock, SystemClock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the sweep scheduler.
#[derive(Debug, Clone)]
pub struct SweepSchedulerConfig {
    /// Time between sweeps. The first sweep runs one interval after start.
    pub interval: Duration,
    /// Timeout for awaiting the task on stop.
    pub join_timeout: Duration,
}

impl Default for SweepSchedulerConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(300), join_timeout: Duration::from_secs(5) }
    }
}

/// Sweeps an [`AdaptiveCache`] at a fixed interval.
pub struct SweepScheduler<V, C: Clock = SystemClock> {
    cache: Arc<AdaptiveCache<V, C>>,
    config: SweepSchedulerConfig,
    cancellation: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<V, C> SweepScheduler<V, C>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
    C: Clock,
{
    pub fn new(cache: Arc<AdaptiveCache<V, C>>, config: SweepSchedulerConfig) -> Self {
        Self { cache, config, cancellation: CancellationToken::new(), task: None }
    }

    /// Spawn the sweep loop.
    ///
    /// # Errors
    ///
    /// Returns error if the scheduler is already running or the interval is
    /// zero.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        if self.config.interval.is_zero() {
            return Err(SchedulerError::InvalidConfig("sweep interval must be greater than 0".into()));
        }

        // Fresh token so the scheduler can be restarted after stop.
        self.cancellation = CancellationToken::new();

        let cache = Arc::clone(&self.cache);
        let interval = self.config.interval;
        let cancel = self.cancellation.clone();
        self.task = Some(tokio::spawn(async move {
            Self::sweep_loop(cache, interval, cancel).await;
        }));

        info!(interval_secs = interval.as_secs(), "Cache sweep scheduler started");
        Ok(())
    }

    /// Cancel the sweep loop and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns error if the scheduler is not running, or the task does not
    /// finish within the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.task.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();
        let join_timeout = self.config.join_timeout;
        tokio::time::timeout(join_timeout, handle)
            .await
            .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;

        info!("Cache sweep scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn sweep_loop(cache: Arc<AdaptiveCache<V, C>>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Sweep loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = cache.sweep().await;
                    let stats = cache.stats();
                    debug!(removed, tracked = stats.tracked, hit_rate = stats.hit_rate(), "Scheduled cache sweep");
                }
            }
        }
    }
}

impl<V, C: Clock> Drop for SweepScheduler<V, C> {
    fn drop(&mut self) {
        if self.task.is_some() && !self.cancellation.is_cancelled() {
            warn!("SweepScheduler dropped while running; cancelling");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use oncovista_common::{MemoryStore, MockClock, TtlPolicy};

    use super::*;

    fn cache(clock: MockClock) -> Arc<AdaptiveCache<String, MockClock>> {
        Arc::new(AdaptiveCache::with_clock(Arc::new(MemoryStore::new()), TtlPolicy::default(), clock))
    }

    /// Validates that the loop sweeps expired entries on its own.
    ///
    /// # Test Steps
    /// 1. Insert a low-confidence entry (30 min TTL) and expire it
    /// 2. Start the scheduler with a short interval
    /// 3. Advance paused tokio time past one interval
    ///
    /// Assertions:
    /// - Confirms the entry is no longer tracked.
    #[tokio::test(start_paused = true)]
    async fn sweeps_expired_entries_periodically() {
        let clock = MockClock::new();
        let cache = cache(clock.clone());
        cache.set("recommendations:a", &"entry".to_string(), 0.2).await.unwrap();
        clock.advance(Duration::from_secs(31 * 60));

        let mut scheduler = SweepScheduler::new(
            Arc::clone(&cache),
            SweepSchedulerConfig { interval: Duration::from_secs(60), ..Default::default() },
        );
        scheduler.start().unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.stats().tracked, 0);
        assert!(cache.stats().sweeps >= 1);

        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn lifecycle_errors() {
        let mut scheduler = SweepScheduler::new(cache(MockClock::new()), SweepSchedulerConfig::default());

        assert!(matches!(scheduler.stop().await, Err(SchedulerError::NotRunning)));
        scheduler.start().unwrap();
        assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyRunning)));
        scheduler.stop().await.unwrap();
        scheduler.start().unwrap();
        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let mut scheduler = SweepScheduler::new(
            cache(MockClock::new()),
            SweepSchedulerConfig { interval: Duration::ZERO, ..Default::default() },
        );
        assert!(matches!(scheduler.start(), Err(SchedulerError::InvalidConfig(_))));
    }
}
