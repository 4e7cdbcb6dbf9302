//! Service error types.

use scrivener_metadata::MetadataError;
use scrivener_storage::StorageError;
use scrivener_vault::VaultError;

/// Errors surfaced by the orchestration layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    /// A step failed and so did its compensation. The registry is left in an
    /// ambiguous state that only a sync pass can repair.
    #[error("{operation} failed ({cause}) and compensation failed ({compensation}); run sync")]
    NeedsManualSync {
        operation: &'static str,
        cause: String,
        compensation: String,
    },

    #[error("unauthorized")]
    Unauthorized,

    #[error("file too large: limit is {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Metadata(e) => match e {
                MetadataError::DuplicateData(_) => "duplicate_data",
                MetadataError::NoRecordFound(_) => "no_record_found",
                MetadataError::ResourceConflict(_) => "resource_conflict",
                MetadataError::ResourceLocked(_) => "resource_locked",
                MetadataError::UploadIssue(_) => "upload_issue",
                _ => "metadata_error",
            },
            Self::Storage(e) => match e {
                StorageError::NotFound(_) => "object_not_found",
                _ => "storage_error",
            },
            Self::Vault(e) => match e {
                VaultError::InvalidFormat(_) => "invalid_format",
                VaultError::AuthenticationFailure => "authentication_failure",
                _ => "vault_error",
            },
            Self::NeedsManualSync { .. } => "needs_manual_sync",
            Self::Unauthorized => "unauthorized",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::Publish(_) => "publish_failed",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal_error",
        }
    }

    pub(crate) fn manual_sync(
        operation: &'static str,
        cause: impl std::fmt::Display,
        compensation: impl std::fmt::Display,
    ) -> Self {
        Self::NeedsManualSync {
            operation,
            cause: cause.to_string(),
            compensation: compensation.to_string(),
        }
    }
}

impl From<scrivener_core::Error> for ServiceError {
    fn from(err: scrivener_core::Error) -> Self {
        match err {
            scrivener_core::Error::InvalidFileName(_) => Self::InvalidInput(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
