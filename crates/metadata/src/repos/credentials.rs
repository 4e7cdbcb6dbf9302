//! API credential repository.

use crate::error::MetadataResult;
use crate::models::ApiCredentialRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for issued API credentials.
#[async_trait]
pub trait CredentialRepo: Send + Sync {
    /// Store a credential.
    async fn create_credential(&self, credential: &ApiCredentialRow) -> MetadataResult<()>;

    /// Look up a credential by its raw bytes.
    async fn get_credential(&self, credential: &[u8])
    -> MetadataResult<Option<ApiCredentialRow>>;

    /// Delete a credential by its raw bytes. `NoRecordFound` if unknown.
    async fn delete_credential(&self, credential: &[u8]) -> MetadataResult<()>;

    /// Count credentials held by a user.
    async fn count_credentials(&self, user_id: Uuid) -> MetadataResult<u64>;
}
