//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
///
/// The first five variants are the registry's typed outcomes: callers match on
/// them to decide between retrying, compensating and surfacing the failure.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("data already exists: {0}")]
    DuplicateData(String),

    #[error("no record found: {0}")]
    NoRecordFound(String),

    /// The row changed since the caller observed it, or is not in the state
    /// the caller's step expects.
    #[error("resource conflict: {0}")]
    ResourceConflict(String),

    #[error("resource locked, try again later: {0}")]
    ResourceLocked(String),

    /// The record's upload status does not allow the operation.
    #[error("upload issue, the file is pending or failed: {0}")]
    UploadIssue(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    /// Map a unique-constraint violation to `DuplicateData`, passing any
    /// other database error through.
    pub(crate) fn from_unique(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::DuplicateData(what.into())
            }
            _ => Self::Database(err),
        }
    }
}

impl From<scrivener_core::Error> for MetadataError {
    fn from(err: scrivener_core::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
