//! Tiered retrieval: remote service, cache, rule-based fallback.

pub mod builder;
pub mod engine;
pub mod error;
pub mod ports;
mod trail;

pub use builder::RecommendationEngineBuilder;
pub use engine::{RecommendationEngine, RetrieveOptions};
pub use error::{RetrieveError, RetrieveResult};
pub use ports::RecommendationService;
