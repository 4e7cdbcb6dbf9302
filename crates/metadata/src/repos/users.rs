//! User repository.

use crate::error::MetadataResult;
use crate::models::UserRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for user accounts.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user. Fails with `DuplicateData` if the email is taken.
    async fn create_user(&self, email: &str) -> MetadataResult<UserRow>;

    /// Get a user by ID.
    async fn get_user(&self, user_id: Uuid) -> MetadataResult<Option<UserRow>>;

    /// Get a user by email.
    async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>>;
}
