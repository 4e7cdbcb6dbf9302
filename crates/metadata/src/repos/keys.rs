//! Signing key repository.

use crate::error::MetadataResult;
use crate::models::SigningKeyRow;
use async_trait::async_trait;

/// Repository for encrypted signing key material.
#[async_trait]
pub trait SigningKeyRepo: Send + Sync {
    /// Count key rows stored for a purpose.
    async fn count_signing_keys(&self, purpose: &str) -> MetadataResult<u64>;

    /// Store a key. Fails with `DuplicateData` if the purpose already has one.
    async fn create_signing_key(&self, key: &SigningKeyRow) -> MetadataResult<()>;

    /// Get the active key for a purpose.
    async fn get_active_signing_key(&self, purpose: &str)
    -> MetadataResult<Option<SigningKeyRow>>;
}
