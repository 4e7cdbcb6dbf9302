//! File operations: the upload and delete sagas, rename and listing.
//!
//! Object store writes happen outside any registry transaction. Each saga
//! brackets them with a registry lock and, when a step fails, runs the
//! compensating registry transition using the version token it holds.

use crate::error::{ServiceError, ServiceResult};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use scrivener_core::UploadStatus;
use scrivener_core::file::{object_key_for, validate_file_name};
use scrivener_metadata::MetadataStore;
use scrivener_metadata::models::{CommitFile, FileRow};
use scrivener_storage::{ObjectStore, StorageError, StreamingUpload};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Coordinates the registry and the object store for a user's files.
pub struct FileService {
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn ObjectStore>,
    max_file_size: u64,
}

impl FileService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn ObjectStore>,
        max_file_size: u64,
    ) -> Self {
        Self {
            metadata,
            storage,
            max_file_size,
        }
    }

    /// Store a new file.
    ///
    /// 1. create a `{Locked, Pending}` placeholder (fails fast on a taken name)
    /// 2. stream content under a fresh object key
    /// 3. on a write failure, delete the placeholder
    /// 4. on a failure to publish the object, commit the record as `Failed`
    /// 5. otherwise commit it as `Success`, removing the object if that fails
    #[instrument(skip(self, content), fields(user_id = %user_id))]
    pub async fn upload<S>(
        &self,
        user_id: Uuid,
        file_name: &str,
        content: S,
    ) -> ServiceResult<FileRow>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send,
    {
        validate_file_name(file_name)?;

        let placeholder = self.metadata.create_file(user_id, file_name).await?;
        let object_key = object_key_for(user_id, file_name);
        tracing::debug!(file_id = %placeholder.file_id, object_key = %object_key, "created placeholder");

        let upload = match self.storage.put_stream(&object_key).await {
            Ok(upload) => upload,
            Err(e) => return Err(self.discard_placeholder(&placeholder, e.into()).await),
        };

        let upload = match self.write_content(upload, content).await {
            Ok(upload) => upload,
            Err(e) => return Err(self.discard_placeholder(&placeholder, e).await),
        };

        let commit = CommitFile {
            file_id: placeholder.file_id,
            user_id,
            object_key,
            expected_updated_at: placeholder.updated_at,
            status: UploadStatus::Success,
        };

        if let Err(e) = upload.finish().await {
            // Bytes may be partially visible, so the record is kept as Failed.
            tracing::warn!(file_id = %placeholder.file_id, error = %e, "finishing upload failed, marking record failed");
            let failed = CommitFile {
                status: UploadStatus::Failed,
                ..commit
            };
            return Err(match self.metadata.commit_file(&failed).await {
                Ok(_) => e.into(),
                Err(comp) => {
                    tracing::error!(file_id = %placeholder.file_id, error = %comp, "could not mark record failed");
                    ServiceError::manual_sync("upload", e, comp)
                }
            });
        }

        let row = match self.metadata.commit_file(&commit).await {
            Ok(row) => row,
            Err(e) => return Err(self.discard_content(&commit, e.into()).await),
        };

        tracing::info!(file_id = %row.file_id, "upload complete");
        Ok(row)
    }

    /// Copy `content` into `upload`, enforcing the size limit. The upload is
    /// aborted on any failure.
    async fn write_content<S>(
        &self,
        mut upload: Box<dyn StreamingUpload>,
        content: S,
    ) -> ServiceResult<Box<dyn StreamingUpload>>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send,
    {
        let mut content = std::pin::pin!(content);
        let mut written: u64 = 0;

        let result = async {
            while let Some(chunk) = content.next().await {
                let chunk = chunk.map_err(StorageError::Io)?;
                written += chunk.len() as u64;
                if written > self.max_file_size {
                    return Err(ServiceError::FileTooLarge {
                        limit: self.max_file_size,
                    });
                }
                upload.write(chunk).await?;
            }
            Ok::<(), ServiceError>(())
        }
        .await;

        match result {
            Ok(()) => Ok(upload),
            Err(e) => {
                if let Err(abort_err) = upload.abort().await {
                    tracing::warn!(error = %abort_err, "failed to abort partial upload");
                }
                Err(e)
            }
        }
    }

    /// Compensate a failed write by removing the placeholder. Returns the
    /// error to surface.
    async fn discard_placeholder(&self, placeholder: &FileRow, cause: ServiceError) -> ServiceError {
        tracing::warn!(file_id = %placeholder.file_id, error = %cause, "upload write failed, removing placeholder");
        match self
            .metadata
            .delete_file(placeholder.user_id, placeholder.file_id, placeholder.updated_at)
            .await
        {
            Ok(()) => cause,
            Err(comp) => {
                tracing::error!(file_id = %placeholder.file_id, error = %comp, "could not remove placeholder");
                ServiceError::manual_sync("upload", cause, comp)
            }
        }
    }

    /// Compensate a failed `Success` commit by removing the stored object.
    /// The record never received the key, so sync removes it later.
    async fn discard_content(&self, commit: &CommitFile, cause: ServiceError) -> ServiceError {
        tracing::warn!(
            file_id = %commit.file_id,
            object_key = %commit.object_key,
            error = %cause,
            "commit failed after content was stored, removing object"
        );
        match self.storage.delete(&commit.object_key).await {
            Ok(()) => cause,
            Err(comp) => {
                tracing::error!(object_key = %commit.object_key, error = %comp, "could not remove stored object");
                ServiceError::manual_sync("upload", cause, comp)
            }
        }
    }

    /// Delete a settled file and its content.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn delete(&self, user_id: Uuid, file_name: &str) -> ServiceResult<()> {
        let locked = self.metadata.lock_file(user_id, file_name).await?;

        if let Some(object_key) = locked.object_key.as_deref() {
            match self.storage.delete(object_key).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!(object_key, "object already gone");
                }
                Err(e) => {
                    tracing::warn!(file_id = %locked.file_id, error = %e, "object delete failed, releasing lock");
                    return Err(match self
                        .metadata
                        .release_file_lock(user_id, locked.file_id, locked.updated_at)
                        .await
                    {
                        Ok(_) => e.into(),
                        Err(comp) => {
                            tracing::error!(file_id = %locked.file_id, error = %comp, "could not release lock");
                            ServiceError::manual_sync("delete", e, comp)
                        }
                    });
                }
            }
        }

        if let Err(e) = self
            .metadata
            .delete_file(user_id, locked.file_id, locked.updated_at)
            .await
        {
            // Content is gone; the locked record is removed by the next sync.
            tracing::error!(file_id = %locked.file_id, error = %e, "content deleted but record removal failed");
            return Err(ServiceError::manual_sync(
                "delete",
                e,
                "no compensation once content is deleted",
            ));
        }

        tracing::info!(file_id = %locked.file_id, "file deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn rename(
        &self,
        user_id: Uuid,
        old_name: &str,
        new_name: &str,
    ) -> ServiceResult<FileRow> {
        validate_file_name(new_name)?;
        Ok(self.metadata.rename_file(user_id, old_name, new_name).await?)
    }

    /// Settled files, ordered by name.
    pub async fn list(&self, user_id: Uuid) -> ServiceResult<Vec<FileRow>> {
        Ok(self.metadata.list_files(user_id).await?)
    }
}
