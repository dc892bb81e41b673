//! Audit trail records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::envelope::Source;
use crate::types::query::TreatmentQuery;

/// What happened in one retrieval phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOutcome {
    /// The phase produced the envelope returned to the caller.
    Served,
    /// The phase ran and failed.
    Failed,
    /// The phase was not attempted (offline, breaker open, underspecified).
    Skipped,
    /// The cache phase found no live entry.
    Miss,
    /// The caller cancelled the retrieval during this phase.
    Cancelled,
}

/// Immutable record of one phase of one retrieval.
///
/// Records sharing a `retrieval_id` belong to the same call and are
/// numbered by `sequence` in the order the phases ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub retrieval_id: Uuid,
    pub sequence: u32,
    pub query: TreatmentQuery,
    /// Tier the phase belongs to.
    pub source: Source,
    pub outcome: PhaseOutcome,
    pub result_summary: String,
    pub confidence: f64,
    pub fallback_used: bool,
    pub decision_rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Milliseconds since the start of the retrieval.
    pub duration_ms: u64,
}

impl AuditRecord {
    pub fn is_served(&self) -> bool {
        self.outcome == PhaseOutcome::Served
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let record = AuditRecord {
            retrieval_id: Uuid::nil(),
            sequence: 1,
            query: TreatmentQuery::new("Breast Cancer"),
            source: Source::Cache,
            outcome: PhaseOutcome::Served,
            result_summary: "AC-T".into(),
            confidence: 0.64,
            fallback_used: false,
            decision_rationale: "remote unavailable, cache hit".into(),
            error_detail: None,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            duration_ms: 12,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["retrievalId"], Uuid::nil().to_string());
        assert_eq!(json["outcome"], "served");
        assert_eq!(json["source"], "cache");
        assert_eq!(json["durationMs"], 12);
        assert!(json.get("errorDetail").is_none());
        assert!(record.is_served());
    }
}
