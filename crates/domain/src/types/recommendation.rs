//! Recommendations and the remote service wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    DEFAULT_EVIDENCE_LEVEL, DEFAULT_PERFORMANCE_STATUS, DEFAULT_REMOTE_CONFIDENCE, MAX_ALTERNATIVES,
};
use crate::errors::{OncoVistaError, Result};
use crate::types::query::TreatmentQuery;

/// One treatment protocol with its supporting detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentOption {
    pub id: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    pub drugs: Vec<String>,
    #[serde(default)]
    pub guidelines: Vec<String>,
    pub evidence_level: String,
    #[serde(default)]
    pub nccn_references: Vec<String>,
    /// Score the producer assigned to this option, in `[0, 1]`.
    pub score: f64,
    pub reasoning: String,
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub safety_flags: Vec<String>,
    #[serde(default)]
    pub clinical_warnings: Vec<String>,
}

impl TreatmentOption {
    /// Split a protocol string like `"Carboplatin + Paclitaxel"` into drugs.
    pub fn drugs_from_protocol(protocol: &str) -> Vec<String> {
        protocol.split(" + ").map(str::trim).filter(|d| !d.is_empty()).map(str::to_string).collect()
    }
}

/// A primary protocol plus alternatives, as served to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub primary: TreatmentOption,
    #[serde(default)]
    pub alternatives: Vec<TreatmentOption>,
    /// Producer's overall confidence, before any provenance discount.
    pub confidence: f64,
    pub evidence: String,
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub fallback_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_note: Option<String>,
    #[serde(default)]
    pub ai_enhanced: bool,
}

/// Body of `POST /api/generate-recommendation`.
///
/// Wildcard filters are omitted rather than sent as `"all"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub cancer_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histology: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment_intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_of_treatment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub biomarkers: Vec<String>,
    pub performance_status: u8,
    pub session_id: Uuid,
    pub request_timestamp: DateTime<Utc>,
}

impl RecommendationRequest {
    pub fn from_query(query: &TreatmentQuery, session_id: Uuid, now: DateTime<Utc>) -> Self {
        let query = query.normalized();
        Self {
            cancer_type: query.cancer_type,
            histology: query.histology,
            treatment_intent: query.treatment_intent,
            line_of_treatment: query.line_of_treatment,
            stage: query.stage,
            biomarkers: query.biomarkers,
            performance_status: query.performance_status.unwrap_or(DEFAULT_PERFORMANCE_STATUS),
            session_id,
            request_timestamp: now,
        }
    }
}

/// A single recommendation as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecommendation {
    #[serde(default)]
    pub id: Option<String>,
    pub treatment_protocol: String,
    #[serde(default)]
    pub evidence_reference: Option<String>,
    #[serde(default)]
    pub nccn_reference: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub contraindications: Vec<String>,
}

/// Raw response body of the remote service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecommendationResponse {
    #[serde(default)]
    pub recommendations: Vec<RemoteRecommendation>,
    #[serde(default)]
    pub overall_confidence: Option<f64>,
    #[serde(default)]
    pub fallback_used: Option<bool>,
    #[serde(default)]
    pub fallback_note: Option<String>,
    #[serde(default)]
    pub ai_enhanced: Option<bool>,
}

impl RemoteRecommendationResponse {
    /// Transform into the domain shape: the first recommendation becomes the
    /// primary, the next two the alternatives.
    ///
    /// A response without recommendations is rejected, as is a missing or
    /// non-positive overall confidence replaced by the 0.8 default.
    pub fn into_recommendation(self, query: &TreatmentQuery) -> Result<Recommendation> {
        let mut items = self.recommendations.into_iter();
        let primary = items.next().ok_or_else(|| {
            OncoVistaError::InvalidInput("remote response contained no recommendations".into())
        })?;

        let intent = query.normalized().treatment_intent;
        let confidence = self
            .overall_confidence
            .filter(|c| c.is_finite() && *c > 0.0)
            .map_or(DEFAULT_REMOTE_CONFIDENCE, |c| c.min(1.0));

        Ok(Recommendation {
            primary: option_from_remote(primary, intent.as_ref(), 0),
            alternatives: items
                .take(MAX_ALTERNATIVES)
                .enumerate()
                .map(|(i, rec)| option_from_remote(rec, intent.as_ref(), i + 1))
                .collect(),
            confidence,
            evidence: "NCCN-aligned protocols with AI enhancement".to_string(),
            alerts: Vec::new(),
            fallback_used: self.fallback_used.unwrap_or(false),
            fallback_note: self.fallback_note,
            ai_enhanced: self.ai_enhanced.unwrap_or(true),
        })
    }
}

fn option_from_remote(rec: RemoteRecommendation, intent: Option<&String>, index: usize) -> TreatmentOption {
    let score = rec.confidence_score.filter(|s| s.is_finite()).map_or(0.0, |s| s.clamp(0.0, 1.0));
    TreatmentOption {
        id: rec.id.unwrap_or_else(|| format!("remote-{index}")),
        drugs: TreatmentOption::drugs_from_protocol(&rec.treatment_protocol),
        protocol: rec.treatment_protocol,
        intent: intent.cloned(),
        guidelines: rec.evidence_reference.iter().cloned().collect(),
        evidence_level: rec.evidence_reference.unwrap_or_else(|| DEFAULT_EVIDENCE_LEVEL.to_string()),
        nccn_references: rec.nccn_reference.into_iter().collect(),
        score,
        reasoning: rec.reasoning.unwrap_or_default(),
        alerts: rec.contraindications.clone(),
        safety_flags: rec.contraindications,
        clinical_warnings: Vec::new(),
    }
}
