//! Durable audit sinks.
//!
//! - [`HttpAuditSink`]: JSON webhook
//! - [`FileAuditSink`]: append-only JSON lines

pub mod file_sink;
pub mod http_sink;

pub use file_sink::FileAuditSink;
pub use http_sink::HttpAuditSink;
