//! Static protocol table for the rule-based fallback.

use oncovista_domain::constants::{DEFAULT_EVIDENCE_LEVEL, FALLBACK_CONFIDENCE};
use oncovista_domain::{Recommendation, TreatmentOption, TreatmentQuery};

use super::ports::FallbackGenerator;

const FALLBACK_ALERT: &str = "System operating in fallback mode - verify recommendations independently";
const FALLBACK_NOTE: &str = "API unavailable - using basic rule engine";
const FALLBACK_GUIDELINE: &str = "NCCN Guidelines (Fallback Mode)";
const FALLBACK_REFERENCE: &str = "Fallback Mode";

const PRIMARY_SCORE: f64 = 0.5;
const ALTERNATIVE_SCORE: f64 = 0.4;

/// `(cancer type, [primary, alternatives...])`; matched case-insensitively.
const PROTOCOLS: &[(&str, &[&str])] = &[
    (
        "Breast Cancer",
        &[
            "AC-T (Doxorubicin/Cyclophosphamide \u{2192} Paclitaxel)",
            "TCH (Docetaxel, Carboplatin, Trastuzumab)",
        ],
    ),
    ("Non-Small Cell Lung Cancer", &["Carboplatin + Paclitaxel", "Pembrolizumab monotherapy"]),
    (
        "Colorectal Cancer",
        &["FOLFOX (5-FU, Leucovorin, Oxaliplatin)", "FOLFIRI (5-FU, Leucovorin, Irinotecan)"],
    ),
];

const DEFAULT_PROTOCOLS: &[&str] = &["Standard of care protocol", "Alternative standard protocol"];

/// Standard-of-care protocols for the most common cancer types, with a
/// generic pair for everything else.
///
/// Output is a pure function of the query: identifiers are derived from the
/// cancer type and position, never from time.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicProtocolRules;

impl BasicProtocolRules {
    pub fn new() -> Self {
        Self
    }

    /// Protocols for `cancer_type`, primary first.
    pub fn protocols_for(cancer_type: &str) -> &'static [&'static str] {
        let cancer_type = cancer_type.trim();
        PROTOCOLS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(cancer_type))
            .map_or(DEFAULT_PROTOCOLS, |(_, protocols)| *protocols)
    }
}

impl FallbackGenerator for BasicProtocolRules {
    fn generate(&self, query: &TreatmentQuery) -> Recommendation {
        let normalized = query.normalized();
        let slug = slug(&normalized.cancer_type);
        let intent = normalized.treatment_intent;

        let mut protocols = Self::protocols_for(&normalized.cancer_type).iter();
        let primary_protocol = protocols.next().copied().unwrap_or("Standard of care protocol");

        let primary = TreatmentOption {
            id: format!("fallback-{slug}"),
            protocol: primary_protocol.to_string(),
            intent: intent.clone(),
            drugs: TreatmentOption::drugs_from_protocol(primary_protocol),
            guidelines: vec![FALLBACK_GUIDELINE.to_string()],
            evidence_level: DEFAULT_EVIDENCE_LEVEL.to_string(),
            nccn_references: vec![FALLBACK_REFERENCE.to_string()],
            score: PRIMARY_SCORE,
            reasoning: "Fallback recommendation based on standard protocols. Please verify with current NCCN guidelines."
                .to_string(),
            alerts: vec!["This is a fallback recommendation - verify with current guidelines".to_string()],
            safety_flags: vec!["Verify dosing and contraindications".to_string()],
            clinical_warnings: vec!["Limited data available - use clinical judgment".to_string()],
        };

        let alternatives = protocols
            .enumerate()
            .map(|(index, protocol)| TreatmentOption {
                id: format!("fallback-alt-{slug}-{index}"),
                protocol: (*protocol).to_string(),
                intent: intent.clone(),
                drugs: TreatmentOption::drugs_from_protocol(protocol),
                guidelines: vec![FALLBACK_GUIDELINE.to_string()],
                evidence_level: DEFAULT_EVIDENCE_LEVEL.to_string(),
                nccn_references: vec![FALLBACK_REFERENCE.to_string()],
                score: ALTERNATIVE_SCORE,
                reasoning: "Alternative fallback recommendation".to_string(),
                alerts: vec!["Alternative fallback recommendation".to_string()],
                safety_flags: vec!["Verify appropriateness".to_string()],
                clinical_warnings: vec!["Limited data available".to_string()],
            })
            .collect();

        Recommendation {
            primary,
            alternatives,
            confidence: FALLBACK_CONFIDENCE,
            evidence: "Fallback mode - limited evidence available".to_string(),
            alerts: vec![FALLBACK_ALERT.to_string()],
            fallback_used: true,
            fallback_note: Some(FALLBACK_NOTE.to_string()),
            ai_enhanced: false,
        }
    }
}

fn slug(cancer_type: &str) -> String {
    let slug: String = cancer_type
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "default".to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_cancer_type_gets_its_protocols() {
        let rec = BasicProtocolRules.generate(
            &TreatmentQuery::new("non-small cell lung cancer").with_treatment_intent("Palliative"),
        );
        assert_eq!(rec.primary.protocol, "Carboplatin + Paclitaxel");
        assert_eq!(rec.primary.drugs, vec!["Carboplatin".to_string(), "Paclitaxel".to_string()]);
        assert_eq!(rec.primary.intent.as_deref(), Some("Palliative"));
        assert_eq!(rec.alternatives.len(), 1);
        assert_eq!(rec.alternatives[0].protocol, "Pembrolizumab monotherapy");
        assert!(rec.fallback_used);
        assert!(!rec.ai_enhanced);
    }

    /// Validates that the generator is total and deterministic.
    ///
    /// Assertions:
    /// - Confirms the wildcard and an empty cancer type get the default pair.
    /// - Confirms repeated calls produce identical output.
    #[test]
    fn wildcard_and_unknown_get_default_protocols() {
        let rules = BasicProtocolRules::new();
        for cancer_type in ["all", "", "Mesothelioma"] {
            let rec = rules.generate(&TreatmentQuery::new(cancer_type));
            assert_eq!(rec.primary.protocol, "Standard of care protocol");
            assert_eq!(rec.primary.evidence_level, "Category 2B");
            assert_eq!(rec, rules.generate(&TreatmentQuery::new(cancer_type)));
        }
    }

    #[test]
    fn identifiers_are_derived_from_cancer_type() {
        let rec = BasicProtocolRules.generate(&TreatmentQuery::new("Breast Cancer"));
        assert_eq!(rec.primary.id, "fallback-breast-cancer");
        assert_eq!(rec.alternatives[0].id, "fallback-alt-breast-cancer-0");
        assert!((rec.primary.score - 0.5).abs() < f64::EPSILON);
        assert!((rec.alternatives[0].score - 0.4).abs() < f64::EPSILON);
    }
}
