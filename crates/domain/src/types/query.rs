//! Treatment selection query.

use serde::{Deserialize, Serialize};

use crate::constants::WILDCARD;

/// Criteria a recommendation is requested for.
///
/// Two queries that differ only in letter-case of the wildcard, surrounding
/// whitespace, or the order of set-valued fields describe the same request;
/// [`normalized`](Self::normalized) maps them to the same value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreatmentQuery {
    pub cancer_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histology: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub biomarkers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_of_treatment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_treatments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_status: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_reason: Option<String>,
}

impl TreatmentQuery {
    pub fn new(cancer_type: impl Into<String>) -> Self {
        Self { cancer_type: cancer_type.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    #[must_use]
    pub fn with_histology(mut self, histology: impl Into<String>) -> Self {
        self.histology = Some(histology.into());
        self
    }

    #[must_use]
    pub fn with_biomarkers<I, S>(mut self, biomarkers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.biomarkers = biomarkers.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_treatment_intent(mut self, intent: impl Into<String>) -> Self {
        self.treatment_intent = Some(intent.into());
        self
    }

    #[must_use]
    pub fn with_line_of_treatment(mut self, line: impl Into<String>) -> Self {
        self.line_of_treatment = Some(line.into());
        self
    }

    #[must_use]
    pub fn with_previous_treatments<I, S>(mut self, treatments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.previous_treatments = treatments.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_performance_status(mut self, status: u8) -> Self {
        self.performance_status = Some(status);
        self
    }

    /// True when the query names no cancer type (empty or the `all`
    /// wildcard). Such a query cannot be answered by the remote service.
    pub fn is_underspecified(&self) -> bool {
        let cancer_type = self.cancer_type.trim();
        cancer_type.is_empty() || cancer_type.eq_ignore_ascii_case(WILDCARD)
    }

    /// Canonical form used for cache keys.
    ///
    /// Strings are trimmed, wildcard or empty filters become `None`, and
    /// set-valued fields are sorted and de-duplicated.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            cancer_type: self.cancer_type.trim().to_string(),
            stage: filter(self.stage.as_deref()),
            histology: filter(self.histology.as_deref()),
            biomarkers: set(&self.biomarkers),
            treatment_intent: filter(self.treatment_intent.as_deref()),
            line_of_treatment: filter(self.line_of_treatment.as_deref()),
            previous_treatments: set(&self.previous_treatments),
            performance_status: self.performance_status,
            change_reason: filter(self.change_reason.as_deref()),
        }
    }

    /// Short human-readable label for logs and audit summaries.
    pub fn label(&self) -> String {
        let cancer_type = if self.is_underspecified() { WILDCARD } else { self.cancer_type.trim() };
        match self.stage.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(stage) => format!("{cancer_type} (stage {stage})"),
            None => cancer_type.to_string(),
        }
    }
}

fn filter(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(WILDCARD))
        .map(str::to_string)
}

fn set(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> =
        values.iter().map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect();
    out.sort();
    out.dedup();
    out
}
