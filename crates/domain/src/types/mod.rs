//! Domain data types

pub mod audit;
pub mod envelope;
pub mod query;
pub mod recommendation;

pub use audit::{AuditRecord, PhaseOutcome};
pub use envelope::{ResultEnvelope, Source};
pub use query::TreatmentQuery;
pub use recommendation::{
    Recommendation, RecommendationRequest, RemoteRecommendation, RemoteRecommendationResponse,
    TreatmentOption,
};
