use thiserror::Error;

/// The only way a retrieval ends without an envelope.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RetrieveError {
    /// The caller cancelled the retrieval.
    #[error("retrieval cancelled by caller")]
    Cancelled,
}

pub type RetrieveResult<T> = Result<T, RetrieveError>;
