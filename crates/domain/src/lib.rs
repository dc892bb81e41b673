//! # OncoVista Domain
//!
//! Data types shared by every layer of the retrieval engine.
//!
//! This crate contains:
//! - The treatment query and its canonical form
//! - Recommendations, the remote wire format and the result envelope
//! - Audit records
//! - Configuration structures and the domain error type
//!
//! ## Architecture
//! - No dependencies on other OncoVista crates
//! - No I/O; pure data and validation

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
