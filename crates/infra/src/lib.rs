//! # OncoVista Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The reqwest client for the remote recommendation service
//! - Durable audit sinks (HTTP webhook, JSON-lines file)
//! - The file-backed cache store
//! - TCP reachability probing
//! - Configuration loading, tracing setup and the cache sweep scheduler
//!
//! ## Architecture
//! - Implements traits defined in `oncovista-core` and `oncovista-common`
//! - Contains all "impure" code (network, filesystem, process environment)

pub mod audit;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod reachability;
pub mod runtime;
pub mod scheduling;
pub mod storage;

// Re-export commonly used items
pub use audit::{FileAuditSink, HttpAuditSink};
pub use errors::InfraError;
pub use http::HttpRecommendationClient;
pub use observability::{init_tracing, LogFormat};
pub use reachability::TcpReachabilityProbe;
pub use runtime::EngineRuntime;
pub use scheduling::{SchedulerError, SweepScheduler, SweepSchedulerConfig};
pub use storage::FileStore;
