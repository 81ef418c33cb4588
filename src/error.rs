//! Error types for the motionstore engine.

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the storage-facing half of the engine.
///
/// Per-line parse problems are not errors: they are recovered locally and
/// reported through [`IngestReport`](crate::IngestReport). Per-batch commit
/// failures are likewise reported through
/// [`BatchOutcome`](crate::BatchOutcome) so the caller can pick a retry or
/// skip policy without losing the batches already committed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Filter validation failed; no storage call was issued.
    #[error("invalid query filter: {reason}")]
    InvalidFilter { reason: String },

    /// The connection pool had no free connection within the configured
    /// checkout bound. Retryable.
    #[error("connection pool exhausted; retry the operation")]
    PoolExhausted,

    /// Any other database error.
    #[error("storage error: {0}")]
    Storage(sqlx::Error),

    /// Failed to read an input file during ingestion.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether the caller may reasonably retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::PoolExhausted)
    }

    pub(crate) fn invalid_filter(reason: impl Into<String>) -> Self {
        EngineError::InvalidFilter {
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            // Checkout timed out: fail fast and tell the caller it can retry
            // instead of letting the task hang on the pool.
            sqlx::Error::PoolTimedOut => EngineError::PoolExhausted,
            other => EngineError::Storage(other),
        }
    }
}
