//! Port interface for the local fallback generator

use oncovista_domain::{Recommendation, TreatmentQuery};

/// Deterministic baseline recommendation for any query.
///
/// Implementations must be total and fast: they run synchronously on the
/// retrieval path and must return a value for every query, including the
/// `all` wildcard.
pub trait FallbackGenerator: Send + Sync {
    fn generate(&self, query: &TreatmentQuery) -> Recommendation;
}
