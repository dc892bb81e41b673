//! Per-retrieval audit bookkeeping.

use std::time::Instant;

use oncovista_common::Clock;
use oncovista_domain::{AuditRecord, PhaseOutcome, Source, TreatmentQuery};
use uuid::Uuid;

use crate::audit::AuditDispatcher;

/// Outcome of one phase, before it is stamped into an [`AuditRecord`].
#[derive(Debug, Clone)]
pub(crate) struct PhaseReport {
    source: Source,
    outcome: PhaseOutcome,
    confidence: f64,
    summary: String,
    rationale: String,
    error: Option<String>,
}

impl PhaseReport {
    pub(crate) fn new(source: Source, outcome: PhaseOutcome, rationale: impl Into<String>) -> Self {
        Self {
            source,
            outcome,
            confidence: 0.0,
            summary: String::new(),
            rationale: rationale.into(),
            error: None,
        }
    }

    pub(crate) fn served(mut self, summary: impl Into<String>, confidence: f64) -> Self {
        self.summary = summary.into();
        self.confidence = confidence;
        self
    }

    pub(crate) fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Numbers and timestamps the phase records of one retrieval.
pub(crate) struct AuditTrail<'a, C: Clock> {
    dispatcher: &'a AuditDispatcher,
    clock: &'a C,
    query: &'a TreatmentQuery,
    retrieval_id: Uuid,
    started: Instant,
    sequence: u32,
}

impl<'a, C: Clock> AuditTrail<'a, C> {
    pub(crate) fn new(dispatcher: &'a AuditDispatcher, clock: &'a C, query: &'a TreatmentQuery) -> Self {
        Self {
            dispatcher,
            clock,
            query,
            retrieval_id: Uuid::now_v7(),
            started: clock.now(),
            sequence: 0,
        }
    }

    pub(crate) fn retrieval_id(&self) -> Uuid {
        self.retrieval_id
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(self.started);
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    pub(crate) fn emit(&mut self, report: PhaseReport) {
        self.sequence += 1;
        let fallback_used = matches!(report.source, Source::Fallback | Source::Offline)
            && report.outcome == PhaseOutcome::Served;
        self.dispatcher.record(AuditRecord {
            retrieval_id: self.retrieval_id,
            sequence: self.sequence,
            query: self.query.clone(),
            source: report.source,
            outcome: report.outcome,
            result_summary: report.summary,
            confidence: report.confidence,
            fallback_used,
            decision_rationale: report.rationale,
            error_detail: report.error,
            timestamp: self.clock.utc_now(),
            duration_ms: self.elapsed_ms(),
        });
    }
}
