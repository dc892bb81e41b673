//! Circuit breaker guarding calls to an unreliable remote dependency.
//!
//! The breaker counts consecutive failures. Once the count reaches the
//! configured threshold it opens and rejects attempts until the cooldown has
//! strictly elapsed since the last failure, then lets exactly one probe
//! through in the half-open state. The probe's outcome either closes the
//! breaker or reopens it with a fresh cooldown.
//!
//! All state lives behind a single mutex so concurrent callers never lose an
//! update to the failure count or the state.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};

/// Invalid resilience configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Result type for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Attempts flow through; failures are counted.
    Closed,
    /// Attempts are rejected until the cooldown elapses.
    Open,
    /// A single probe attempt decides whether to close or reopen.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time that must strictly pass after the last failure before a probe.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, cooldown: Duration::from_secs(60) }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`]
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.config.cooldown = cooldown;
        self
    }

    /// Set a custom clock and build the breaker directly (useful for testing)
    pub fn clock<C: Clock>(self, clock: C) -> CircuitBreakerBuilderWithClock<C> {
        CircuitBreakerBuilderWithClock { config: self.config, clock }
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Builder with custom clock that builds a [`CircuitBreaker`] directly
pub struct CircuitBreakerBuilderWithClock<C: Clock> {
    config: CircuitBreakerConfig,
    clock: C,
}

impl<C: Clock> CircuitBreakerBuilderWithClock<C> {
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.config.cooldown = cooldown;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreaker<C>> {
        CircuitBreaker::with_clock(self.config, self.clock)
    }
}

/// Point-in-time snapshot of breaker counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Attempts refused while open or while a half-open probe was in flight.
    pub rejected_attempts: u64,
    /// Number of Closed/HalfOpen to Open transitions.
    pub times_opened: u64,
    pub last_failure: Option<Instant>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
    /// Incremented for every admitted half-open probe.
    probe_generation: u64,
    total_successes: u64,
    total_failures: u64,
    rejected_attempts: u64,
    times_opened: u64,
}

impl BreakerState {
    const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            probe_in_flight: false,
            probe_generation: 0,
            total_successes: 0,
            total_failures: 0,
            rejected_attempts: 0,
            times_opened: 0,
        }
    }

    fn claim_probe(&mut self) -> u64 {
        self.probe_in_flight = true;
        self.probe_generation = self.probe_generation.wrapping_add(1);
        self.probe_generation
    }

    fn trip(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.last_failure = Some(now);
        self.probe_in_flight = false;
        self.times_opened += 1;
    }
}

/// Consecutive-failure circuit breaker.
///
/// Clones share state, so one breaker can be handed to every component that
/// talks to the same remote service.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("consecutive_failures", &inner.consecutive_failures)
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a breaker on the system clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a breaker using the builder pattern
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, inner: Arc::new(Mutex::new(BreakerState::new())), clock: Arc::new(clock) })
    }

    /// The configuration this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Decide whether a remote attempt may be made now.
    ///
    /// In the open state this is also where the transition to half-open
    /// happens, once `now - last_failure` strictly exceeds the cooldown. The
    /// caller that receives `true` in half-open owns the single probe and must
    /// report its outcome through [`record_success`](Self::record_success),
    /// [`record_failure`](Self::record_failure) or
    /// [`record_cancelled`](Self::record_cancelled). Prefer
    /// [`try_acquire`](Self::try_acquire), which releases the probe slot even
    /// when the caller never reports back.
    pub fn allow_attempt(&self) -> bool {
        self.admit().is_some()
    }

    /// Admit an attempt and return a permit that reports its outcome.
    ///
    /// Dropping the permit without settling it counts as a cancellation, so a
    /// half-open probe whose future is dropped frees the slot for the next
    /// caller.
    pub fn try_acquire(&self) -> Option<AttemptPermit<'_, C>> {
        self.admit().map(|probe| AttemptPermit { breaker: self, probe, settled: false })
    }

    /// `None` when refused, `Some(Some(generation))` for a half-open probe.
    fn admit(&self) -> Option<Option<u64>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Some(None),
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .map_or(true, |at| now.saturating_duration_since(at) > self.config.cooldown);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    let generation = inner.claim_probe();
                    info!(state = %CircuitState::HalfOpen, "Circuit breaker cooldown elapsed, admitting probe");
                    Some(Some(generation))
                } else {
                    inner.rejected_attempts += 1;
                    debug!(state = %inner.state, "Circuit breaker rejecting attempt");
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    inner.rejected_attempts += 1;
                    debug!("Circuit breaker probe already in flight, rejecting attempt");
                    None
                } else {
                    Some(Some(inner.claim_probe()))
                }
            }
        }
    }

    /// Free the probe slot held by `generation` if it is still the current one.
    fn release_probe(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen
            && inner.probe_in_flight
            && inner.probe_generation == generation
        {
            inner.probe_in_flight = false;
            debug!("Half-open probe abandoned, slot released");
        }
    }

    /// Record a successful remote call. Any success closes the circuit and
    /// clears the failure count.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.total_successes += 1;
        let previous = inner.state;
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;
        if previous != CircuitState::Closed {
            info!(previous = %previous, "Circuit breaker closed after successful call");
        }
    }

    /// Record a failed remote call (timeout or error response).
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        match inner.state {
            CircuitState::Closed => {
                inner.last_failure = Some(now);
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.trip(now);
                    warn!(
                        failures = inner.consecutive_failures,
                        "Circuit breaker opened after consecutive failures"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.trip(now);
                warn!("Circuit breaker reopened after failed probe");
            }
            CircuitState::Open => {
                // Late result from an attempt admitted before the circuit opened.
                inner.last_failure = Some(now);
            }
        }
    }

    /// Record an attempt the caller cancelled. Cancellation is not a failure;
    /// it only releases the half-open probe slot.
    pub fn record_cancelled(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    /// Current state without triggering any transition.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Current consecutive failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Snapshot of counters for monitoring.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            rejected_attempts: inner.rejected_attempts,
            times_opened: inner.times_opened,
            last_failure: inner.last_failure,
        }
    }

    /// Operator reset back to a fresh closed breaker.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let generation = inner.probe_generation;
        *inner = BreakerState { probe_generation: generation, ..BreakerState::new() };
        drop(inner);
        info!("Circuit breaker manually reset to closed state");
    }
}

/// One admitted attempt. Settle it with [`success`](Self::success),
/// [`failure`](Self::failure) or [`cancelled`](Self::cancelled); dropping it
/// unsettled is treated as a cancellation.
#[must_use = "an unsettled permit is recorded as a cancelled attempt"]
pub struct AttemptPermit<'a, C: Clock = SystemClock> {
    breaker: &'a CircuitBreaker<C>,
    probe: Option<u64>,
    settled: bool,
}

impl<C: Clock> AttemptPermit<'_, C> {
    /// Whether this attempt is the single half-open trial.
    pub fn is_trial(&self) -> bool {
        self.probe.is_some()
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }

    pub fn cancelled(mut self) {
        self.settled = true;
        self.release();
    }

    fn release(&self) {
        if let Some(generation) = self.probe {
            self.breaker.release_probe(generation);
        }
    }
}

impl<C: Clock> Drop for AttemptPermit<'_, C> {
    fn drop(&mut self) {
        if !self.settled {
            self.release();
        }
    }
}

impl<C: Clock> fmt::Debug for AttemptPermit<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptPermit").field("probe", &self.probe).field("settled", &self.settled).finish()
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self {
            config: CircuitBreakerConfig::default(),
            inner: Arc::new(Mutex::new(BreakerState::new())),
            clock: Arc::new(SystemClock),
        }
    }
}
