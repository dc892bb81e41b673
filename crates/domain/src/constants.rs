//! Domain constants
//!
//! Defaults for the scoring heuristics and the remote wire contract. Every
//! value here can be overridden through [`Config`](crate::Config).

/// Multiplier applied to a result's confidence when it is served from cache.
pub const CACHE_CONFIDENCE_DISCOUNT: f64 = 0.8;
/// Confidence of a rule-based fallback result.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
/// Confidence of a rule-based result for a query without a cancer type.
pub const UNDERSPECIFIED_CONFIDENCE: f64 = 0.1;
/// Confidence of the terminal offline envelope.
pub const OFFLINE_CONFIDENCE: f64 = 0.1;
/// Overall confidence assumed when the remote omits it.
pub const DEFAULT_REMOTE_CONFIDENCE: f64 = 0.8;

/// Performance status sent when the query does not carry one.
pub const DEFAULT_PERFORMANCE_STATUS: u8 = 1;
/// Evidence level assumed when the remote omits one.
pub const DEFAULT_EVIDENCE_LEVEL: &str = "Category 2B";
/// Remote recommendations kept as alternatives after the primary.
pub const MAX_ALTERNATIVES: usize = 2;

/// Query value meaning "no filter".
pub const WILDCARD: &str = "all";

pub const RECOMMENDATION_PATH: &str = "/api/generate-recommendation";
pub const AUDIT_PATH: &str = "/api/audit/log";
