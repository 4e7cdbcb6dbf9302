//! Database models mapping to the registry schema.

use crate::error::MetadataResult;
use scrivener_core::{FileState, LockStatus, UploadStatus};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Users
// =============================================================================

/// Registered user.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub email: String,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// File records
// =============================================================================

/// File record. `updated_at` doubles as the row's version token.
#[derive(Debug, Clone, FromRow)]
pub struct FileRow {
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    /// Set once content is durably stored.
    pub object_key: Option<String>,
    /// `true` while an operation holds the record.
    pub lock_status: bool,
    /// One of `PENDING`, `SUCCESS`, `FAILED`.
    pub upload_status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl FileRow {
    pub fn lock(&self) -> LockStatus {
        LockStatus::from_locked(self.lock_status)
    }

    pub fn upload(&self) -> MetadataResult<UploadStatus> {
        Ok(UploadStatus::parse(&self.upload_status)?)
    }

    pub fn state(&self) -> MetadataResult<FileState> {
        Ok(FileState::new(self.lock(), self.upload()?))
    }
}

/// Arguments of the commit step that closes an upload cycle.
#[derive(Debug, Clone)]
pub struct CommitFile {
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub object_key: String,
    /// Version token returned when the placeholder was created.
    pub expected_updated_at: OffsetDateTime,
    /// `Success` or `Failed`.
    pub status: UploadStatus,
}

// =============================================================================
// Signing keys
// =============================================================================

/// Signing key material for one purpose.
#[derive(Debug, Clone, FromRow)]
pub struct SigningKeyRow {
    pub key_id: Uuid,
    pub purpose: String,
    /// SPKI PEM.
    pub public_key: String,
    /// Sealed PKCS#1 PEM: `salt || nonce || ciphertext`.
    pub private_key: Vec<u8>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// API credentials
// =============================================================================

/// Issued API credential.
#[derive(Clone, FromRow)]
pub struct ApiCredentialRow {
    pub credential_id: Uuid,
    pub user_id: Uuid,
    /// Raw credential bytes, also the lookup key.
    pub credential: Vec<u8>,
    /// RSA PKCS#1 v1.5 signature over SHA-256 of `credential`.
    pub signature: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl std::fmt::Debug for ApiCredentialRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentialRow")
            .field("credential_id", &self.credential_id)
            .field("user_id", &self.user_id)
            .field("credential", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
