//! Object storage gateway and backends for scrivener.
//!
//! File content lives under `{user_id}/{generated-name}` keys. This crate
//! provides:
//! - The [`ObjectStore`] trait consumed by uploads, deletes and reconciliation
//! - Atomic streaming writes
//! - Backends: local filesystem and S3-compatible

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, s3::S3Backend};
pub use error::{StorageError, StorageResult};
pub use traits::{KeyStream, ObjectStore, StreamingUpload};

use scrivener_core::config::{Secret, StorageConfig};
use std::sync::Arc;

/// Open the object store named by `config`.
///
/// The configuration is validated first, so a half-specified S3 key pair is
/// a `Config` error rather than a silent fallback to ambient credentials.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    let store: Arc<dyn ObjectStore> = match config {
        StorageConfig::Filesystem { path } => Arc::new(FilesystemBackend::new(path).await?),
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => Arc::new(
            S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                static_credentials(access_key_id.as_deref(), secret_access_key.as_ref()),
                *force_path_style,
            )
            .await?,
        ),
    };

    tracing::debug!(backend = store.backend_name(), "object store ready");
    Ok(store)
}

fn static_credentials(key_id: Option<&str>, secret: Option<&Secret>) -> Option<(String, String)> {
    Some((key_id?.to_string(), secret?.expose().to_string()))
}
