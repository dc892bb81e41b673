//! The uniform result returned by every retrieval.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::recommendation::Recommendation;

/// Where a served result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Fresh answer from the remote service.
    Api,
    /// Previously stored remote answer.
    Cache,
    /// Local rule-based baseline.
    Fallback,
    /// Nothing could be produced.
    Offline,
}

impl Source {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Cache => "cache",
            Self::Fallback => "fallback",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommendation annotated with provenance and confidence.
///
/// Constructed only through the per-source constructors, which keep
/// `confidence` in `[0, 1]` and mark fallback and offline results degraded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    payload: Option<Recommendation>,
    source: Source,
    confidence: f64,
    degraded: bool,
    retry_count: u32,
}

impl ResultEnvelope {
    pub fn api(payload: Recommendation, confidence: f64, retry_count: u32) -> Self {
        Self::build(Some(payload), Source::Api, confidence, false, retry_count)
    }

    /// Cached results are time-bounded but authoritative, so not degraded.
    pub fn cache(payload: Recommendation, confidence: f64, retry_count: u32) -> Self {
        Self::build(Some(payload), Source::Cache, confidence, false, retry_count)
    }

    pub fn fallback(payload: Recommendation, confidence: f64, retry_count: u32) -> Self {
        Self::build(Some(payload), Source::Fallback, confidence, true, retry_count)
    }

    pub fn offline(confidence: f64, retry_count: u32) -> Self {
        Self::build(None, Source::Offline, confidence, true, retry_count)
    }

    fn build(
        payload: Option<Recommendation>,
        source: Source,
        confidence: f64,
        degraded: bool,
        retry_count: u32,
    ) -> Self {
        let confidence = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };
        Self { payload, source, confidence, degraded, retry_count }
    }

    pub fn payload(&self) -> Option<&Recommendation> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<Recommendation> {
        self.payload
    }

    pub const fn source(&self) -> Source {
        self.source
    }

    pub const fn confidence(&self) -> f64 {
        self.confidence
    }

    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Retries spent on the remote phase before this result was produced.
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }
}
