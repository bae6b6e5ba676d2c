//! Domain error types surfaced to callers of the engine.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Errors raised by the engine's operations.
///
/// Validation errors are detected before any write happens; store failures
/// are surfaced unchanged and never retried here.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested excuse date range is not acceptable.
    #[error("invalid date range: {0}")]
    InvalidRange(String),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller lacks the role or relationship required. Authorization is
    /// checked by collaborators; this only carries their rejection.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The operation is not allowed for this date (closed day or future).
    #[error("attendance cannot be recorded for {0}")]
    DateNotRecordable(chrono::NaiveDate),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DomainError::NotFound {
            entity,
            id: id.into(),
        }
    }
}
