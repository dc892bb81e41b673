//! Infrastructure error conversions.

pub mod conversions;

pub use conversions::{attempt_error, InfraError};
