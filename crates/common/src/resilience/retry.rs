//! Bounded retry loop cooperating with the circuit breaker.
//!
//! Each attempt is gated by [`CircuitBreaker::try_acquire`], bounded by a
//! per-attempt timeout, and raced against the caller's cancellation token.
//! The permit is held across the attempt, so dropping the whole retry future
//! mid-probe still frees the breaker's half-open slot.
//! Failed attempts wait on a fixed delay schedule before the next try. The
//! breaker is consulted again before every retry, and a breaker that opened
//! during the sequence stops it without sleeping.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{CircuitBreaker, CircuitState, ConfigError, ConfigResult};
use super::clock::{Clock, Sleeper, TokioSleeper};

/// Classified outcome of a single failed attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    /// The attempt exceeded its deadline and was dropped.
    #[error("attempt timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The remote answered with a failure, or its answer could not be parsed.
    #[error("remote call failed (status {status:?}): {message}")]
    Http { status: Option<u16>, message: String },

    /// The caller cancelled the attempt.
    #[error("attempt aborted by caller")]
    Aborted,
}

impl AttemptError {
    /// Convenience constructor for [`AttemptError::Http`].
    pub fn http(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Why a retry sequence ended without a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetryError {
    /// The breaker refused the attempt; nothing was sent.
    #[error("circuit breaker is open, attempt skipped")]
    CircuitOpen,

    /// The last attempt's classified failure.
    #[error(transparent)]
    Attempt(#[from] AttemptError),
}

impl RetryError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Attempt(AttemptError::Aborted))
    }
}

/// Result of a whole retry sequence together with its bookkeeping.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, RetryError>,
    /// Attempts actually sent to the remote.
    pub attempts: u32,
    /// Retries that followed the first attempt.
    pub retries: u32,
    /// Backoff delays waited, in order.
    pub delays: Vec<Duration>,
    /// Display form of the most recent attempt failure.
    pub last_error: Option<String>,
}

impl<T> RetryOutcome<T> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> Result<T, RetryError> {
        self.result
    }

    /// Total time spent in backoff.
    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the n-th retry. The last entry repeats if the schedule is
    /// shorter than `max_retries`.
    pub delays: Vec<Duration>,
    /// Deadline for a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delays: vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)],
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Delay to wait before retry number `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let idx = usize::try_from(retry).unwrap_or(usize::MAX);
        self.delays.get(idx).or_else(|| self.delays.last()).copied().unwrap_or(Duration::ZERO)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.attempt_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                message: "attempt_timeout must be greater than 0".to_string(),
            });
        }
        if self.max_retries > 0 && self.delays.is_empty() {
            return Err(ConfigError::Invalid {
                message: "delays must not be empty when retries are enabled".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`RetryConfig`]
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn delays(mut self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.config.delays = delays.into_iter().collect();
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.config.attempt_timeout = timeout;
        self
    }

    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Runs an attempt function under the retry schedule.
#[derive(Debug, Clone)]
pub struct RetryExecutor<S: Sleeper = TokioSleeper> {
    config: RetryConfig,
    sleeper: S,
}

impl RetryExecutor<TokioSleeper> {
    /// Executor that sleeps on the tokio timer.
    pub fn new(config: RetryConfig) -> Self {
        Self::with_sleeper(config, TokioSleeper)
    }
}

impl<S: Sleeper> RetryExecutor<S> {
    /// Executor with an injected sleeper (useful for testing)
    pub fn with_sleeper(config: RetryConfig, sleeper: S) -> Self {
        Self { config, sleeper }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `attempt` until it succeeds, the schedule is exhausted, the
    /// breaker refuses, or `cancel` fires.
    ///
    /// `attempt` receives the zero-based attempt index. Successes and
    /// timeout/HTTP failures are reported to `breaker`; cancellation is not.
    #[instrument(skip_all, fields(max_retries = self.config.max_retries))]
    pub async fn execute<C, F, Fut, T>(
        &self,
        breaker: &CircuitBreaker<C>,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> RetryOutcome<T>
    where
        C: Clock,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut attempts = 0_u32;
        let mut delays = Vec::new();
        let mut last_error: Option<String> = None;

        let outcome = |result, attempts: u32, delays, last_error| RetryOutcome {
            result,
            attempts,
            retries: attempts.saturating_sub(1),
            delays,
            last_error,
        };

        loop {
            if cancel.is_cancelled() {
                return outcome(Err(AttemptError::Aborted.into()), attempts, delays, last_error);
            }
            let Some(permit) = breaker.try_acquire() else {
                debug!(attempts, "Circuit breaker denied attempt");
                return outcome(Err(RetryError::CircuitOpen), attempts, delays, last_error);
            };

            let index = attempts;
            attempts += 1;
            debug!(attempt = attempts, "Executing remote attempt");

            let timeout = self.config.attempt_timeout;
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(AttemptError::Aborted),
                res = tokio::time::timeout(timeout, attempt(index)) => {
                    res.unwrap_or(Err(AttemptError::Timeout { timeout }))
                }
            };

            let error = match result {
                Ok(value) => {
                    permit.success();
                    if attempts > 1 {
                        debug!(retries = attempts - 1, "Remote attempt succeeded after retries");
                    }
                    return outcome(Ok(value), attempts, delays, last_error);
                }
                Err(AttemptError::Aborted) => {
                    permit.cancelled();
                    debug!(attempt = attempts, "Remote attempt aborted by caller");
                    return outcome(Err(AttemptError::Aborted.into()), attempts, delays, last_error);
                }
                Err(error) => error,
            };

            permit.failure();
            last_error = Some(error.to_string());

            if attempts > self.config.max_retries {
                warn!(attempts, error = %error, "All retry attempts exhausted");
                return outcome(Err(error.into()), attempts, delays, last_error);
            }
            if breaker.state() == CircuitState::Open {
                warn!(attempts, error = %error, "Circuit breaker opened, abandoning remaining retries");
                return outcome(Err(error.into()), attempts, delays, last_error);
            }

            let delay = self.config.delay_for(index);
            warn!(attempt = attempts, delay_ms = delay.as_millis(), error = %error, "Remote attempt failed, retrying");
            let slept = tokio::select! {
                biased;
                () = cancel.cancelled() => false,
                () = self.sleeper.sleep(delay) => true,
            };
            if !slept {
                debug!("Cancelled during backoff");
                return outcome(Err(AttemptError::Aborted.into()), attempts, delays, last_error);
            }
            delays.push(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the retry schedule, breaker cooperation, timeouts and
    //! cancellation.

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::resilience::clock::MockClock;
    use crate::testing::RecordingSleeper;

    fn setup(threshold: u32) -> (RetryExecutor<RecordingSleeper>, CircuitBreaker<MockClock>, RecordingSleeper) {
        let clock = MockClock::new();
        let sleeper = RecordingSleeper::with_clock(clock.clone());
        let breaker = CircuitBreaker::builder()
            .clock(clock)
            .failure_threshold(threshold)
            .build()
            .unwrap();
        (RetryExecutor::with_sleeper(RetryConfig::default(), sleeper.clone()), breaker, sleeper)
    }

    #[test]
    fn test_default_schedule() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.delay_for(0), Duration::from_secs(1));
        assert_eq!(config.delay_for(1), Duration::from_secs(2));
        assert_eq!(config.delay_for(2), Duration::from_secs(4));
        assert_eq!(config.delay_for(7), Duration::from_secs(4));
        assert_eq!(config.attempt_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_validation() {
        assert!(RetryConfig::builder().attempt_timeout(Duration::ZERO).build().is_err());
        assert!(RetryConfig::builder().delays([]).build().is_err());
        assert!(RetryConfig::builder().max_retries(0).delays([]).build().is_ok());
    }

    /// Validates that failures follow the fixed 1s, 2s, 4s schedule.
    ///
    /// Assertions:
    /// - Confirms four attempts in total (first plus three retries).
    /// - Confirms the recorded delays are exactly `[1s, 2s, 4s]`.
    /// - Confirms the final error is the last attempt's classification.
    #[tokio::test]
    async fn test_exhausts_schedule() {
        let (executor, breaker, sleeper) = setup(10);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let outcome = executor
            .execute(&breaker, &CancellationToken::new(), |_| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(AttemptError::http(Some(503), "unavailable"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.retries, 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert_eq!(outcome.total_delay(), Duration::from_secs(7));
        assert_eq!(
            outcome.result.unwrap_err(),
            RetryError::Attempt(AttemptError::http(Some(503), "unavailable"))
        );
        assert_eq!(breaker.consecutive_failures(), 4);
    }

    /// Validates success after a transient failure.
    ///
    /// Assertions:
    /// - Confirms the value is returned with one retry recorded.
    /// - Confirms the breaker failure count is reset by the success.
    #[tokio::test]
    async fn test_succeeds_after_retry() {
        let (executor, breaker, sleeper) = setup(10);

        let outcome = executor
            .execute(&breaker, &CancellationToken::new(), |index| async move {
                if index == 0 {
                    Err(AttemptError::Timeout { timeout: Duration::from_secs(30) })
                } else {
                    Ok("payload")
                }
            })
            .await;

        assert_eq!(outcome.result, Ok("payload"));
        assert_eq!(outcome.retries, 1);
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1)]);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(outcome.last_error.is_some());
    }

    /// Validates that an open breaker prevents any attempt.
    ///
    /// Assertions:
    /// - Confirms `CircuitOpen` with zero attempts and no sleeps.
    #[tokio::test]
    async fn test_open_breaker_skips_attempt() {
        let (executor, breaker, sleeper) = setup(1);
        breaker.record_failure();

        let outcome = executor
            .execute(&breaker, &CancellationToken::new(), |_| async { Ok::<_, AttemptError>(1) })
            .await;

        assert_eq!(outcome.result, Err(RetryError::CircuitOpen));
        assert_eq!(outcome.attempts, 0);
        assert!(sleeper.recorded().is_empty());
    }

    /// Validates that a breaker opening mid-sequence stops the retries.
    ///
    /// Assertions:
    /// - Confirms only two attempts are made with a threshold of two.
    /// - Confirms only the first backoff delay was waited.
    #[tokio::test]
    async fn test_breaker_opening_mid_sequence_stops_retries() {
        let (executor, breaker, sleeper) = setup(2);

        let outcome = executor
            .execute(&breaker, &CancellationToken::new(), |_| async {
                Err::<(), _>(AttemptError::http(Some(500), "boom"))
            })
            .await;

        assert_eq!(outcome.attempts, 2);
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1)]);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(matches!(outcome.result, Err(RetryError::Attempt(AttemptError::Http { .. }))));
    }

    /// Validates that an aborted attempt is neither retried nor counted.
    ///
    /// Assertions:
    /// - Confirms a single attempt and an `Aborted` error.
    /// - Confirms the breaker recorded no failure.
    #[tokio::test]
    async fn test_aborted_is_not_retried_or_counted() {
        let (executor, breaker, sleeper) = setup(1);

        let outcome = executor
            .execute(&breaker, &CancellationToken::new(), |_| async {
                Err::<(), _>(AttemptError::Aborted)
            })
            .await;

        assert!(outcome.result.unwrap_err().is_aborted());
        assert_eq!(outcome.attempts, 1);
        assert!(sleeper.recorded().is_empty());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().total_failures, 0);
    }

    /// Validates that a hung attempt is classified as a timeout.
    ///
    /// Assertions:
    /// - Confirms the error is `Timeout` with the configured deadline.
    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout() {
        let breaker = CircuitBreaker::default();
        let executor = RetryExecutor::new(RetryConfig::builder().max_retries(0).build().unwrap());

        let outcome = executor
            .execute(&breaker, &CancellationToken::new(), |_| async {
                futures::future::pending::<Result<(), AttemptError>>().await
            })
            .await;

        assert_eq!(
            outcome.result,
            Err(RetryError::Attempt(AttemptError::Timeout { timeout: Duration::from_secs(30) }))
        );
        assert_eq!(breaker.metrics().total_failures, 1);
    }

    /// Validates that cancellation during backoff stops the sequence.
    ///
    /// Assertions:
    /// - Confirms the outcome is `Aborted` after the first attempt.
    /// - Confirms the cancelled wait is not recorded as a delay.
    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let breaker = CircuitBreaker::default();
        let executor = RetryExecutor::new(RetryConfig::default());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let outcome = executor
            .execute(&breaker, &cancel, |_| {
                let trigger = trigger.clone();
                async move {
                    trigger.cancel();
                    Err::<(), _>(AttemptError::http(None, "connection reset"))
                }
            })
            .await;

        assert!(outcome.result.unwrap_err().is_aborted());
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.delays.is_empty());
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_makes_no_attempt() {
        let (executor, breaker, _sleeper) = setup(5);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = executor.execute(&breaker, &cancel, |_| async { Ok::<_, AttemptError>(()) }).await;

        assert!(outcome.result.unwrap_err().is_aborted());
        assert_eq!(outcome.attempts, 0);
    }
}
