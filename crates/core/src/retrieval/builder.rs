//! Assembles a [`RecommendationEngine`] from configuration and adapters.

use std::sync::Arc;
use std::time::Duration;

use oncovista_common::{
    AdaptiveCache, CircuitBreaker, CircuitBreakerConfig, Clock, KeyValueStore, MemoryStore,
    RetryConfig, RetryExecutor, Sleeper, SystemClock, TokioSleeper, TtlPolicy,
};
use oncovista_domain::{Config, OncoVistaError, Result};
use tracing::info;

use super::engine::RecommendationEngine;
use super::ports::RecommendationService;
use crate::audit::{AuditDispatcher, AuditSink};
use crate::fallback::FallbackGenerator;
use crate::reachability::{ReachabilityMonitor, ReachabilitySignal, WatchReachability};

/// Builder for [`RecommendationEngine`].
///
/// Only the remote service and the fallback generator are required. The
/// rest defaults to an in-memory store, no durable audit sink, an
/// always-online signal, real tokio sleeps and the system clock.
pub struct RecommendationEngineBuilder<C: Clock = SystemClock> {
    remote: Arc<dyn RecommendationService>,
    fallback: Arc<dyn FallbackGenerator>,
    config: Config,
    store: Option<Arc<dyn KeyValueStore>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    reachability: Option<Arc<dyn ReachabilitySignal>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    clock: C,
}

impl RecommendationEngineBuilder<SystemClock> {
    pub fn new(remote: Arc<dyn RecommendationService>, fallback: Arc<dyn FallbackGenerator>) -> Self {
        Self {
            remote,
            fallback,
            config: Config::default(),
            store: None,
            audit_sink: None,
            reachability: None,
            sleeper: None,
            clock: SystemClock,
        }
    }
}

impl<C: Clock + Clone> RecommendationEngineBuilder<C> {
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Backing store for the response cache.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn reachability(mut self, signal: Arc<dyn ReachabilitySignal>) -> Self {
        self.reachability = Some(signal);
        self
    }

    /// Suspension used between retries (useful for testing).
    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Time source for breaker cooldowns, cache expiry and audit stamps.
    pub fn clock<C2: Clock + Clone>(self, clock: C2) -> RecommendationEngineBuilder<C2> {
        RecommendationEngineBuilder {
            remote: self.remote,
            fallback: self.fallback,
            config: self.config,
            store: self.store,
            audit_sink: self.audit_sink,
            reachability: self.reachability,
            sleeper: self.sleeper,
            clock,
        }
    }

    /// Validate the configuration, wire the components and sample
    /// reachability once.
    pub async fn build(self) -> Result<RecommendationEngine<C>> {
        let config = self.config;
        config.validate()?;

        let breaker_config = CircuitBreakerConfig::builder()
            .failure_threshold(config.breaker.failure_threshold)
            .cooldown(config.breaker.cooldown())
            .build()
            .map_err(config_error)?;
        let breaker = CircuitBreaker::with_clock(breaker_config, self.clock.clone()).map_err(config_error)?;

        let retry_config = RetryConfig::builder()
            .max_retries(config.retry.max_retries)
            .delays(config.retry.delays())
            .attempt_timeout(config.retry.attempt_timeout())
            .build()
            .map_err(config_error)?;
        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));
        let retry = RetryExecutor::with_sleeper(retry_config, sleeper);

        let policy = TtlPolicy::new(
            config
                .cache
                .ttl_tiers
                .iter()
                .map(|tier| (tier.min_confidence, Duration::from_secs(tier.ttl_secs))),
            Duration::from_secs(config.cache.floor_ttl_secs),
            Duration::from_secs(config.cache.last_known_good_ttl_secs),
        )
        .map_err(config_error)?;
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let cache = Arc::new(AdaptiveCache::with_clock(store, policy, self.clock.clone()));

        let signal = self.reachability.unwrap_or_else(|| Arc::new(WatchReachability::online()));
        let reachability = Arc::new(ReachabilityMonitor::new(signal));
        if config.reachability.start_offline {
            reachability.mark_offline();
        }
        reachability.start().await;

        let audit = Arc::new(AuditDispatcher::new(self.audit_sink, &config.audit));

        info!(
            failure_threshold = config.breaker.failure_threshold,
            cooldown_secs = config.breaker.cooldown_secs,
            max_retries = config.retry.max_retries,
            namespace = %config.cache.namespace,
            "Recommendation engine ready"
        );

        Ok(RecommendationEngine {
            remote: self.remote,
            fallback: self.fallback,
            cache,
            breaker,
            retry,
            reachability,
            audit,
            scoring: config.scoring,
            namespace: config.cache.namespace,
            clock: Arc::new(self.clock),
        })
    }
}

fn config_error(err: impl std::fmt::Display) -> OncoVistaError {
    OncoVistaError::Config(err.to_string())
}
