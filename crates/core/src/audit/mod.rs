//! Non-blocking audit trail for retrieval decisions.

pub mod dispatcher;
pub mod ports;

pub use dispatcher::{AuditDispatcher, AuditStats};
pub use ports::{AuditSink, SinkError};
