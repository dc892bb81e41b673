//! # OncoVista Core
//!
//! Retrieval policy - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the remote service, audit sink and
//!   reachability signal
//! - The rule-based fallback generator
//! - The audit dispatcher and reachability monitor
//! - The recommendation engine (tiered fallback orchestration)
//!
//! ## Architecture Principles
//! - Depends only on `oncovista-common` and `oncovista-domain`
//! - No HTTP, filesystem or socket code
//! - All external collaborators via traits

pub mod audit;
pub mod fallback;
pub mod reachability;
pub mod retrieval;

pub use audit::{AuditDispatcher, AuditSink, AuditStats, SinkError};
pub use fallback::{BasicProtocolRules, FallbackGenerator};
pub use reachability::{ReachabilityMonitor, ReachabilitySignal, WatchReachability};
pub use retrieval::{
    RecommendationEngine, RecommendationEngineBuilder, RecommendationService, RetrieveError,
    RetrieveOptions, RetrieveResult,
};
