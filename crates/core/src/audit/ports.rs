//! Port interface for durable audit storage

use async_trait::async_trait;
use oncovista_domain::AuditRecord;
use thiserror::Error;

/// Failure to hand a record to the durable sink. Never reaches callers of
/// the retrieval engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for audit records (webhook, log file, ...).
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Deliver one record. Best effort; the dispatcher logs and drops failures.
    async fn send(&self, record: &AuditRecord) -> Result<(), SinkError>;
}
