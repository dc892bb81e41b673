//! The fallback orchestrator.
//!
//! A retrieval walks the tiers in order and stops at the first that yields:
//!
//! 1. underspecified query: straight to the rule engine at minimal confidence
//! 2. remote service, through the retry executor and circuit breaker (skipped
//!    while offline); a success is cached before it is returned
//! 3. cache: the adaptive entry, then the last-known-good entry, discounted
//! 4. rule-based fallback, degraded
//! 5. static offline envelope if the rule engine itself fails
//!
//! Every phase exit is audited in execution order. Only caller cancellation
//! escapes as an error.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use oncovista_common::{
    canonical_key, AdaptiveCache, AttemptError, CacheStats, CircuitBreaker, CircuitBreakerMetrics,
    CircuitState, Clock, RetryError, RetryExecutor, RetryOutcome, Sleeper, SystemClock,
};
use oncovista_domain::{
    AuditRecord, PhaseOutcome, Recommendation, ResultEnvelope, ScoringConfig, Source, TreatmentQuery,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::builder::RecommendationEngineBuilder;
use super::error::{RetrieveError, RetrieveResult};
use super::ports::RecommendationService;
use super::trail::{AuditTrail, PhaseReport};
use crate::audit::{AuditDispatcher, AuditStats};
use crate::fallback::FallbackGenerator;
use crate::reachability::ReachabilityMonitor;

const LAST_KNOWN_GOOD_PREFIX: &str = "lkg";

/// Per-call options for [`RecommendationEngine::retrieve_with`].
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    cancellation: Option<CancellationToken>,
}

impl RetrieveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the retrieval when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Cache keys belonging to one query.
#[derive(Debug, Clone)]
struct CacheKeys {
    primary: String,
    last_known_good: String,
}

enum RemotePhase {
    Served(ResultEnvelope),
    Cancelled,
    Unavailable { retries: u32 },
}

/// Resilient recommendation retrieval.
///
/// The breaker, cache, reachability monitor and audit dispatcher are owned
/// by the engine and shared by every concurrent call. Build one engine per
/// remote service and share it behind an `Arc`.
pub struct RecommendationEngine<C: Clock = SystemClock> {
    pub(super) remote: Arc<dyn RecommendationService>,
    pub(super) fallback: Arc<dyn FallbackGenerator>,
    pub(super) cache: Arc<AdaptiveCache<Recommendation, C>>,
    pub(super) breaker: CircuitBreaker<C>,
    pub(super) retry: RetryExecutor<Arc<dyn Sleeper>>,
    pub(super) reachability: Arc<ReachabilityMonitor>,
    pub(super) audit: Arc<AuditDispatcher>,
    pub(super) scoring: ScoringConfig,
    pub(super) namespace: String,
    pub(super) clock: Arc<C>,
}

impl<C: Clock> std::fmt::Debug for RecommendationEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationEngine")
            .field("breaker", &self.breaker)
            .field("reachability", &self.reachability)
            .field("scoring", &self.scoring)
            .finish_non_exhaustive()
    }
}

impl RecommendationEngine<SystemClock> {
    /// Start building an engine around a remote service and a fallback
    /// generator.
    pub fn builder(
        remote: Arc<dyn RecommendationService>,
        fallback: Arc<dyn FallbackGenerator>,
    ) -> RecommendationEngineBuilder<SystemClock> {
        RecommendationEngineBuilder::new(remote, fallback)
    }
}

impl<C: Clock> RecommendationEngine<C> {
    /// Retrieve a recommendation for `query` with default options.
    pub async fn retrieve(&self, query: &TreatmentQuery) -> RetrieveResult<ResultEnvelope> {
        self.retrieve_with(query, RetrieveOptions::default()).await
    }

    /// Retrieve a recommendation for `query`.
    ///
    /// Always yields an envelope unless the caller cancels through
    /// `options`, in which case [`RetrieveError::Cancelled`] is returned.
    #[instrument(skip_all, fields(query = %query.label()))]
    pub async fn retrieve_with(
        &self,
        query: &TreatmentQuery,
        options: RetrieveOptions,
    ) -> RetrieveResult<ResultEnvelope> {
        let cancellation = options.cancellation.unwrap_or_default();
        let mut trail = AuditTrail::new(&self.audit, self.clock.as_ref(), query);

        if query.is_underspecified() {
            trail.emit(PhaseReport::new(Source::Api, PhaseOutcome::Skipped, "query names no cancer type"));
            let envelope = self.fallback_phase(
                query,
                self.scoring.underspecified_confidence,
                0,
                "underspecified query, rule engine baseline",
                &mut trail,
            );
            return Ok(finish(envelope, &trail));
        }

        let keys = self.keys_for(query);
        let mut retries = 0;

        if self.reachability.is_offline() {
            debug!("Offline, skipping remote phase");
            trail.emit(PhaseReport::new(Source::Api, PhaseOutcome::Skipped, "network offline"));
        } else {
            match self.remote_phase(query, keys.as_ref(), &cancellation, &mut trail).await {
                RemotePhase::Served(envelope) => return Ok(finish(envelope, &trail)),
                RemotePhase::Cancelled => {
                    info!(retrieval_id = %trail.retrieval_id(), "Retrieval cancelled by caller");
                    return Err(RetrieveError::Cancelled);
                }
                RemotePhase::Unavailable { retries: spent } => retries = spent,
            }
        }

        if let Some(keys) = &keys {
            if let Some(envelope) = self.cache_phase(keys, retries, &mut trail).await {
                return Ok(finish(envelope, &trail));
            }
        } else {
            trail.emit(PhaseReport::new(Source::Cache, PhaseOutcome::Skipped, "no cache key for query"));
        }

        let envelope = self.fallback_phase(
            query,
            self.scoring.fallback_confidence,
            retries,
            "remote and cache unavailable, rule engine baseline",
            &mut trail,
        );
        Ok(finish(envelope, &trail))
    }

    /// Drop cached entries for `query`, reset the breaker and retrieve again.
    #[instrument(skip_all, fields(query = %query.label()))]
    pub async fn force_retry(
        &self,
        query: &TreatmentQuery,
        options: RetrieveOptions,
    ) -> RetrieveResult<ResultEnvelope> {
        if let Some(keys) = self.keys_for(query) {
            for key in [&keys.primary, &keys.last_known_good] {
                if let Err(err) = self.cache.invalidate(key).await {
                    warn!(cache_key = %key, error = %err, "Failed to invalidate cache entry");
                }
            }
        }
        self.breaker.reset();
        info!("Forced retry: cache cleared and circuit breaker reset");
        self.retrieve_with(query, options).await
    }

    /// Force the offline path until [`mark_online`](Self::mark_online).
    pub fn mark_offline(&self) {
        self.reachability.mark_offline();
    }

    pub fn mark_online(&self) {
        self.reachability.mark_online();
    }

    pub fn is_offline(&self) -> bool {
        self.reachability.is_offline()
    }

    /// Cache key the engine uses for `query`.
    pub fn cache_key(&self, query: &TreatmentQuery) -> Option<String> {
        self.keys_for(query).map(|keys| keys.primary)
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn breaker_metrics(&self) -> CircuitBreakerMetrics {
        self.breaker.metrics()
    }

    /// Operator reset of the circuit breaker.
    pub fn reset_breaker(&self) {
        self.breaker.reset();
    }

    pub fn cache(&self) -> Arc<AdaptiveCache<Recommendation, C>> {
        Arc::clone(&self.cache)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Remove expired cache entries now.
    pub async fn sweep_cache(&self) -> usize {
        self.cache.sweep().await
    }

    /// The latest audit records, oldest first.
    pub fn recent_audit(&self) -> Vec<AuditRecord> {
        self.audit.recent()
    }

    pub fn audit_stats(&self) -> AuditStats {
        self.audit.stats()
    }

    /// Stop background work: the reachability subscription and the audit
    /// worker, after it has attempted every queued record.
    pub async fn shutdown(&self) {
        self.reachability.shutdown().await;
        self.audit.shutdown().await;
    }

    async fn remote_phase(
        &self,
        query: &TreatmentQuery,
        keys: Option<&CacheKeys>,
        cancellation: &CancellationToken,
        trail: &mut AuditTrail<'_, C>,
    ) -> RemotePhase {
        debug!("Entering remote phase");
        let remote = &self.remote;
        let outcome = self
            .retry
            .execute(&self.breaker, cancellation, move |_: u32| async move {
                let response = remote.call(query).await?;
                response
                    .into_recommendation(query)
                    .map_err(|err| AttemptError::http(None, err.to_string()))
            })
            .await;
        let RetryOutcome { result, attempts, retries, last_error, .. } = outcome;

        match result {
            Ok(recommendation) => {
                let confidence = recommendation.confidence;
                if let Some(keys) = keys {
                    self.store(keys, &recommendation, confidence).await;
                }
                let summary = recommendation.primary.protocol.clone();
                let envelope = ResultEnvelope::api(recommendation, confidence, retries);
                trail.emit(
                    PhaseReport::new(Source::Api, PhaseOutcome::Served, "remote service answered")
                        .served(summary, envelope.confidence()),
                );
                RemotePhase::Served(envelope)
            }
            Err(err) if err.is_aborted() => {
                trail.emit(
                    PhaseReport::new(Source::Api, PhaseOutcome::Cancelled, "caller cancelled")
                        .error(err.to_string()),
                );
                RemotePhase::Cancelled
            }
            Err(RetryError::CircuitOpen) if attempts == 0 => {
                debug!(state = %self.breaker.state(), "Circuit breaker refused remote attempt");
                trail.emit(PhaseReport::new(Source::Api, PhaseOutcome::Skipped, "circuit breaker open"));
                RemotePhase::Unavailable { retries }
            }
            Err(err) => {
                warn!(attempts, retries, error = %err, "Remote phase failed");
                trail.emit(
                    PhaseReport::new(
                        Source::Api,
                        PhaseOutcome::Failed,
                        format!("remote service failed after {attempts} attempt(s)"),
                    )
                    .error(last_error.unwrap_or_else(|| err.to_string())),
                );
                RemotePhase::Unavailable { retries }
            }
        }
    }

    async fn cache_phase(
        &self,
        keys: &CacheKeys,
        retries: u32,
        trail: &mut AuditTrail<'_, C>,
    ) -> Option<ResultEnvelope> {
        debug!(cache_key = %keys.primary, "Entering cache phase");
        let mut failure = None;

        for (key, rationale) in [
            (&keys.primary, "remote unavailable, cached result"),
            (&keys.last_known_good, "remote unavailable, last known good result"),
        ] {
            match self.cache.get(key).await {
                Ok(Some(entry)) => {
                    let confidence = entry.confidence * self.scoring.cache_discount;
                    let summary = entry.value.primary.protocol.clone();
                    let envelope = ResultEnvelope::cache(entry.value, confidence, retries);
                    trail.emit(
                        PhaseReport::new(Source::Cache, PhaseOutcome::Served, rationale)
                            .served(summary, envelope.confidence()),
                    );
                    return Some(envelope);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(cache_key = %key, error = %err, "Cache read failed");
                    failure = Some(err.to_string());
                }
            }
        }

        let mut report = PhaseReport::new(Source::Cache, PhaseOutcome::Miss, "no live cache entry");
        if let Some(failure) = failure {
            report = report.error(failure);
        }
        trail.emit(report);
        None
    }

    fn fallback_phase(
        &self,
        query: &TreatmentQuery,
        confidence: f64,
        retries: u32,
        rationale: &str,
        trail: &mut AuditTrail<'_, C>,
    ) -> ResultEnvelope {
        debug!("Entering rule-fallback phase");
        let generator = Arc::clone(&self.fallback);

        match panic::catch_unwind(AssertUnwindSafe(|| generator.generate(query))) {
            Ok(mut recommendation) => {
                recommendation.fallback_used = true;
                let summary = recommendation.primary.protocol.clone();
                let envelope = ResultEnvelope::fallback(recommendation, confidence, retries);
                trail.emit(
                    PhaseReport::new(Source::Fallback, PhaseOutcome::Served, rationale)
                        .served(summary, envelope.confidence()),
                );
                envelope
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(error = %message, "Fallback generator panicked");
                trail.emit(
                    PhaseReport::new(Source::Fallback, PhaseOutcome::Failed, "rule engine failed")
                        .error(message),
                );
                let envelope = ResultEnvelope::offline(self.scoring.offline_confidence, retries);
                trail.emit(
                    PhaseReport::new(Source::Offline, PhaseOutcome::Served, "every source failed")
                        .served("no recommendation available", envelope.confidence()),
                );
                envelope
            }
        }
    }

    async fn store(&self, keys: &CacheKeys, recommendation: &Recommendation, confidence: f64) {
        if let Err(err) = self.cache.set(&keys.primary, recommendation, confidence).await {
            warn!(cache_key = %keys.primary, error = %err, "Failed to cache remote result");
        }
        if let Err(err) =
            self.cache.set_last_known_good(&keys.last_known_good, recommendation, confidence).await
        {
            warn!(cache_key = %keys.last_known_good, error = %err, "Failed to store last known good result");
        }
    }

    fn keys_for(&self, query: &TreatmentQuery) -> Option<CacheKeys> {
        match canonical_key(&self.namespace, &query.normalized()) {
            Ok(primary) => Some(CacheKeys {
                last_known_good: format!("{LAST_KNOWN_GOOD_PREFIX}:{primary}"),
                primary,
            }),
            Err(err) => {
                warn!(error = %err, "Could not derive cache key");
                None
            }
        }
    }
}

fn finish<C: Clock>(envelope: ResultEnvelope, trail: &AuditTrail<'_, C>) -> ResultEnvelope {
    info!(
        retrieval_id = %trail.retrieval_id(),
        source = %envelope.source(),
        confidence = envelope.confidence(),
        degraded = envelope.is_degraded(),
        retry_count = envelope.retry_count(),
        duration_ms = trail.elapsed_ms(),
        "Retrieval complete"
    );
    envelope
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
