//! File registry repository.
//!
//! Every mutating operation runs in one transaction that reads the row,
//! checks it with the guards below and then writes it. Writers pass back the
//! `updated_at` token they observed; a stale token is a `ResourceConflict`.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{CommitFile, FileRow};
use async_trait::async_trait;
use scrivener_core::{LockStatus, UploadStatus};
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for file records.
#[async_trait]
pub trait FileRepo: Send + Sync {
    /// Insert a `{Locked, Pending}` placeholder for a new upload.
    ///
    /// Fails with `DuplicateData` if the user already has a file of that name.
    async fn create_file(&self, user_id: Uuid, file_name: &str) -> MetadataResult<FileRow>;

    /// Close an upload cycle: record the object key, set the final status
    /// and unlock.
    async fn commit_file(&self, commit: &CommitFile) -> MetadataResult<FileRow>;

    /// Lock a settled file ahead of a rename or delete, re-arming it as
    /// `{Locked, Pending}`. The returned row carries the version token the
    /// next step must present.
    async fn lock_file(&self, user_id: Uuid, file_name: &str) -> MetadataResult<FileRow>;

    /// Undo [`FileRepo::lock_file`]: return the record to `{Unlocked, Success}`.
    async fn release_file_lock(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        expected_updated_at: OffsetDateTime,
    ) -> MetadataResult<FileRow>;

    /// Rename a settled file.
    async fn rename_file(
        &self,
        user_id: Uuid,
        old_name: &str,
        new_name: &str,
    ) -> MetadataResult<FileRow>;

    /// Remove a locked record whose content has been deleted.
    async fn delete_file(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        expected_updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Settle ambiguous records whose content exists. All-or-nothing.
    async fn unlock_files(&self, user_id: Uuid, file_ids: &[Uuid]) -> MetadataResult<u64>;

    /// Remove ambiguous records whose content is gone. All-or-nothing.
    async fn delete_files(&self, user_id: Uuid, file_ids: &[Uuid]) -> MetadataResult<u64>;

    /// Get a file by ID.
    async fn get_file(&self, user_id: Uuid, file_id: Uuid) -> MetadataResult<Option<FileRow>>;

    /// Get a file by name.
    async fn get_file_by_name(
        &self,
        user_id: Uuid,
        file_name: &str,
    ) -> MetadataResult<Option<FileRow>>;

    /// List settled files, ordered by name.
    async fn list_files(&self, user_id: Uuid) -> MetadataResult<Vec<FileRow>>;

    /// List records left in an ambiguous state.
    async fn list_ambiguous_files(&self, user_id: Uuid) -> MetadataResult<Vec<FileRow>>;
}

pub(crate) fn missing_file(user_id: Uuid, what: impl std::fmt::Display) -> MetadataError {
    MetadataError::NoRecordFound(format!("file {what} of user {user_id}"))
}

/// Guard for [`FileRepo::commit_file`].
pub(crate) fn check_commit(row: &FileRow, commit: &CommitFile) -> MetadataResult<()> {
    if !matches!(commit.status, UploadStatus::Success | UploadStatus::Failed) {
        return Err(MetadataError::Internal(format!(
            "commit status must be SUCCESS or FAILED, got {}",
            commit.status
        )));
    }
    if !row.lock().is_locked()
        || row.updated_at != commit.expected_updated_at
        || row.upload()? != UploadStatus::Pending
    {
        return Err(MetadataError::ResourceConflict(format!(
            "file {} changed before commit",
            row.file_id
        )));
    }
    Ok(())
}

/// Guard for [`FileRepo::lock_file`] and [`FileRepo::rename_file`].
pub(crate) fn check_settled(row: &FileRow) -> MetadataResult<()> {
    if row.lock().is_locked() {
        return Err(MetadataError::ResourceLocked(format!(
            "file {} is held by another operation",
            row.file_name
        )));
    }
    if row.upload()? != UploadStatus::Success {
        return Err(MetadataError::UploadIssue(format!(
            "file {} is {}",
            row.file_name, row.upload_status
        )));
    }
    Ok(())
}

/// Guard for [`FileRepo::delete_file`] and [`FileRepo::release_file_lock`]:
/// the caller must still hold the lock it took.
pub(crate) fn check_held(row: &FileRow, expected_updated_at: OffsetDateTime) -> MetadataResult<()> {
    if !row.lock().is_locked() || row.updated_at != expected_updated_at {
        return Err(MetadataError::ResourceConflict(format!(
            "file {} is no longer held by this operation",
            row.file_id
        )));
    }
    if row.upload()? != UploadStatus::Pending {
        return Err(MetadataError::UploadIssue(format!(
            "file {} is {}, expected {}",
            row.file_name,
            row.upload_status,
            UploadStatus::Pending
        )));
    }
    Ok(())
}

/// Guard for bulk reconciliation: the record must still be ambiguous.
pub(crate) fn check_ambiguous(row: &FileRow) -> MetadataResult<()> {
    if row.state()?.is_settled() {
        return Err(MetadataError::ResourceConflict(format!(
            "file {} settled during reconciliation",
            row.file_id
        )));
    }
    Ok(())
}

/// Guard for settling a record as `{Unlocked, Success}`: it needs content.
pub(crate) fn check_has_object(row: &FileRow) -> MetadataResult<()> {
    if row.object_key.is_none() {
        return Err(MetadataError::UploadIssue(format!(
            "file {} has no stored content",
            row.file_id
        )));
    }
    Ok(())
}

/// Column values for a lock/upload state.
pub(crate) fn columns(lock: LockStatus, upload: UploadStatus) -> (bool, &'static str) {
    (lock.is_locked(), upload.as_str())
}
