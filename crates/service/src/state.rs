//! Application wiring.

use crate::auth::CredentialIssuer;
use crate::error::{ServiceError, ServiceResult};
use crate::files::FileService;
use crate::keys::KeyVault;
use crate::publisher::{self, TranscriptPublisher};
use crate::sync::Reconciler;
use crate::transcript::TranscriptService;
use scrivener_core::config::AppConfig;
use scrivener_metadata::MetadataStore;
use scrivener_storage::ObjectStore;
use scrivener_vault::KeyProvider;
use std::sync::Arc;

/// Connected stores plus the active signing key.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metadata: Arc<dyn MetadataStore>,
    pub storage: Arc<dyn ObjectStore>,
    pub publisher: Arc<dyn TranscriptPublisher>,
    pub keys: Arc<dyn KeyProvider>,
}

impl AppState {
    /// Connect the stores, run migrations and make sure the signing key
    /// exists.
    pub async fn from_config(config: AppConfig) -> ServiceResult<Self> {
        config.validate().map_err(ServiceError::InvalidInput)?;

        let storage = scrivener_storage::from_config(&config.storage).await?;
        let metadata = scrivener_metadata::from_config(&config.metadata).await?;
        metadata.migrate().await?;

        let publisher = publisher::from_config(&config.queue);
        Self::assemble(config, metadata, storage, publisher).await
    }

    /// Like [`AppState::from_config`] with the stores and publisher supplied.
    pub async fn assemble(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn ObjectStore>,
        publisher: Arc<dyn TranscriptPublisher>,
    ) -> ServiceResult<Self> {
        let vault = KeyVault::new(
            metadata.clone(),
            config.vault.passphrase.clone(),
            config.vault.key_purpose.clone(),
        );
        vault.ensure_initialized().await?;
        let keys = vault.load_active().await?;

        tracing::info!(
            storage = storage.backend_name(),
            publisher = publisher.name(),
            key_purpose = keys.purpose(),
            "scrivener ready"
        );

        Ok(Self {
            config: Arc::new(config),
            metadata,
            storage,
            publisher,
            keys,
        })
    }

    pub fn files(&self) -> FileService {
        FileService::new(
            self.metadata.clone(),
            self.storage.clone(),
            self.config.upload.max_file_size,
        )
    }

    pub fn credentials(&self) -> CredentialIssuer {
        CredentialIssuer::new(self.metadata.clone(), self.keys.clone())
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.metadata.clone(), self.storage.clone())
    }

    pub fn transcripts(&self) -> TranscriptService {
        TranscriptService::new(self.metadata.clone(), self.publisher.clone())
    }
}
