//! Transcript request publishers.

use crate::error::{ServiceError, ServiceResult};
use async_trait::async_trait;
use scrivener_core::TranscriptRequest;
use scrivener_core::config::QueueConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Hands transcript requests to the transcript worker.
///
/// `publish` returns once the request is durably accepted, not once it has
/// been processed.
#[async_trait]
pub trait TranscriptPublisher: Send + Sync {
    async fn publish(&self, request: &TranscriptRequest) -> ServiceResult<()>;

    fn name(&self) -> &'static str;
}

/// Build the publisher selected by configuration.
pub fn from_config(config: &QueueConfig) -> Arc<dyn TranscriptPublisher> {
    match config {
        QueueConfig::Disabled => Arc::new(DisabledPublisher),
        QueueConfig::Spool { path } => Arc::new(SpoolPublisher::new(path)),
    }
}

/// Appends one JSON line per request to a spool file.
pub struct SpoolPublisher {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SpoolPublisher {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: &[u8]) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line).await?;
        file.sync_data().await
    }
}

#[async_trait]
impl TranscriptPublisher for SpoolPublisher {
    async fn publish(&self, request: &TranscriptRequest) -> ServiceResult<()> {
        let mut line = request.to_json()?;
        line.push(b'\n');
        self.append(&line).await.map_err(|e| {
            ServiceError::Publish(format!("spool {}: {e}", self.path.display()))
        })
    }

    fn name(&self) -> &'static str {
        "spool"
    }
}

/// Rejects every request.
pub struct DisabledPublisher;

#[async_trait]
impl TranscriptPublisher for DisabledPublisher {
    async fn publish(&self, _request: &TranscriptRequest) -> ServiceResult<()> {
        Err(ServiceError::Publish(
            "transcript queue is disabled".to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
