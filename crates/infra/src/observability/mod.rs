//! Logging setup for processes embedding the engine.
//!
//! The engine crates only emit `tracing` events; installing a subscriber is
//! the host's decision. [`init_tracing`] is the default choice.

pub mod tracing;

pub use self::tracing::{init_tracing, LogFormat};
