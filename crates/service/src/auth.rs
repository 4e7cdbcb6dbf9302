//! Credential issuance and authentication.

use crate::error::{ServiceError, ServiceResult};
use scrivener_metadata::models::{ApiCredentialRow, UserRow};
use scrivener_metadata::{MetadataError, MetadataStore};
use scrivener_vault::{KeyProvider, credential};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

/// Mints, verifies and revokes API credentials.
pub struct CredentialIssuer {
    metadata: Arc<dyn MetadataStore>,
    keys: Arc<dyn KeyProvider>,
}

impl CredentialIssuer {
    pub fn new(metadata: Arc<dyn MetadataStore>, keys: Arc<dyn KeyProvider>) -> Self {
        Self { metadata, keys }
    }

    /// Create a user and hand out its first credential.
    #[instrument(skip(self))]
    pub async fn register(&self, email: &str) -> ServiceResult<(UserRow, String)> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::InvalidInput(format!("invalid email: {email:?}")));
        }

        let user = self.metadata.create_user(email).await?;
        let credential = self.issue(user.user_id).await?;
        tracing::info!(user_id = %user.user_id, "registered user");
        Ok((user, credential))
    }

    /// Issue a new credential for an existing user. Returns the transport form.
    #[instrument(skip(self))]
    pub async fn issue(&self, user_id: Uuid) -> ServiceResult<String> {
        if self.metadata.get_user(user_id).await?.is_none() {
            return Err(MetadataError::NoRecordFound(format!("user {user_id}")).into());
        }

        let issued = credential::issue(self.keys.as_ref())?;
        let now = OffsetDateTime::now_utc();
        self.metadata
            .create_credential(&ApiCredentialRow {
                credential_id: Uuid::new_v4(),
                user_id,
                credential: issued.bytes.clone(),
                signature: issued.signature.clone(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        Ok(issued.encoded())
    }

    /// Resolve a presented credential to its owner.
    ///
    /// Malformed, unknown and forged credentials are all `Unauthorized`.
    pub async fn authenticate(&self, presented: &str) -> ServiceResult<Uuid> {
        let bytes = credential::decode(presented).map_err(|_| ServiceError::Unauthorized)?;
        let row = self
            .metadata
            .get_credential(&bytes)
            .await?
            .ok_or(ServiceError::Unauthorized)?;

        credential::verify(&bytes, &row.signature, self.keys.public_key())
            .map_err(|_| ServiceError::Unauthorized)?;
        Ok(row.user_id)
    }

    /// Delete a credential. Later authentication with it fails.
    #[instrument(skip_all)]
    pub async fn revoke(&self, presented: &str) -> ServiceResult<()> {
        let bytes = credential::decode(presented)
            .map_err(|_| ServiceError::InvalidInput("credential is not valid base64".to_string()))?;
        self.metadata.delete_credential(&bytes).await?;
        tracing::info!("revoked credential");
        Ok(())
    }
}
