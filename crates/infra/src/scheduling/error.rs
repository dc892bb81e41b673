//! Scheduler error types

use std::time::Duration;

use oncovista_domain::OncoVistaError;
use thiserror::Error;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Invalid scheduler configuration
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    /// Operation timed out
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        duration: Duration,
        #[source]
        source: tokio::time::error::Elapsed,
    },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(#[from] tokio::task::JoinError),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let domain_err = match err {
            SchedulerError::AlreadyRunning
            | SchedulerError::NotRunning
            | SchedulerError::InvalidConfig(_) => OncoVistaError::InvalidInput(err.to_string()),
            _ => OncoVistaError::Internal(err.to_string()),
        };
        InfraError(domain_err)
    }
}

impl From<SchedulerError> for OncoVistaError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
