//! Key vault: persistent, passphrase-sealed signing keys.

use crate::error::ServiceResult;
use scrivener_core::config::Secret;
use scrivener_metadata::models::SigningKeyRow;
use scrivener_metadata::{MetadataError, MetadataStore};
use scrivener_vault::{ActiveKey, KeyPair, KeyProvider};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

/// Creates and loads the signing key for one purpose.
///
/// A purpose moves from uninitialized to active exactly once. There is no
/// rotation.
pub struct KeyVault {
    metadata: Arc<dyn MetadataStore>,
    passphrase: Secret,
    purpose: String,
}

impl KeyVault {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        passphrase: Secret,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            metadata,
            passphrase,
            purpose: purpose.into(),
        }
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    /// Generate and store a key if none exists. Returns whether one was
    /// generated.
    #[instrument(skip(self), fields(purpose = %self.purpose))]
    pub async fn ensure_initialized(&self) -> ServiceResult<bool> {
        if self.metadata.count_signing_keys(&self.purpose).await? > 0 {
            tracing::debug!("signing key already present");
            return Ok(false);
        }

        let passphrase = self.passphrase.clone();
        let (public_key, private_key) = tokio::task::spawn_blocking(move || {
            let keypair = KeyPair::generate()?;
            let sealed = keypair.secret.seal(passphrase.expose().as_bytes())?;
            Ok::<_, scrivener_vault::VaultError>((keypair.public.to_pem()?, sealed))
        })
        .await??;

        let row = SigningKeyRow {
            key_id: Uuid::new_v4(),
            purpose: self.purpose.clone(),
            public_key,
            private_key,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        };

        match self.metadata.create_signing_key(&row).await {
            Ok(()) => {
                tracing::info!(key_id = %row.key_id, "generated signing key");
                Ok(true)
            }
            Err(MetadataError::DuplicateData(_)) => {
                tracing::debug!("lost initialization race, keeping existing key");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Decrypt the active key for this purpose.
    #[instrument(skip(self), fields(purpose = %self.purpose))]
    pub async fn load_active(&self) -> ServiceResult<Arc<dyn KeyProvider>> {
        let row = self
            .metadata
            .get_active_signing_key(&self.purpose)
            .await?
            .ok_or_else(|| {
                MetadataError::NoRecordFound(format!("signing key for purpose {}", self.purpose))
            })?;

        let passphrase = self.passphrase.clone();
        let keypair = tokio::task::spawn_blocking(move || {
            KeyPair::open(&row.private_key, &row.public_key, passphrase.expose().as_bytes())
        })
        .await??;

        Ok(Arc::new(ActiveKey::new(self.purpose.clone(), keypair)))
    }
}
