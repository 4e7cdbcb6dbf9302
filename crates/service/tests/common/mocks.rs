//! Fault-injecting collaborators.

use async_trait::async_trait;
use bytes::Bytes;
use scrivener_core::TranscriptRequest;
use scrivener_metadata::models::{ApiCredentialRow, CommitFile, FileRow, SigningKeyRow, UserRow};
use scrivener_metadata::repos::{CredentialRepo, FileRepo, SigningKeyRepo, UserRepo};
use scrivener_metadata::{MetadataError, MetadataResult, MetadataStore};
use scrivener_service::{ServiceError, ServiceResult, TranscriptPublisher};
use scrivener_storage::{KeyStream, ObjectStore, StorageError, StorageResult, StreamingUpload};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use uuid::Uuid;

fn injected(what: &str) -> StorageError {
    StorageError::Io(std::io::Error::other(format!("injected {what} failure")))
}

/// Object store wrapper that fails selected operations on demand.
#[allow(dead_code)]
#[derive(Default)]
pub struct StorageFaults {
    pub put_stream: AtomicBool,
    pub write: AtomicBool,
    pub finish: AtomicBool,
    pub delete: AtomicBool,
    pub list: AtomicBool,
}

#[allow(dead_code)]
pub struct FaultyStorage {
    inner: Arc<dyn ObjectStore>,
    pub faults: Arc<StorageFaults>,
}

#[allow(dead_code)]
impl FaultyStorage {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            faults: Arc::new(StorageFaults::default()),
        })
    }
}

/// Arm a fault flag.
#[allow(dead_code)]
pub fn trip(flag: &AtomicBool) {
    flag.store(true, Ordering::SeqCst);
}

#[async_trait]
impl ObjectStore for FaultyStorage {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        if self.faults.put_stream.load(Ordering::SeqCst) {
            return Err(injected("put_stream"));
        }
        let inner = self.inner.put_stream(key).await?;
        Ok(Box::new(FaultyUpload {
            inner,
            faults: self.faults.clone(),
        }))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.faults.delete.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete(key).await
    }

    async fn list_stream(&self, prefix: &str) -> StorageResult<KeyStream> {
        if self.faults.list.load(Ordering::SeqCst) {
            return Err(injected("list"));
        }
        self.inner.list_stream(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}

struct FaultyUpload {
    inner: Box<dyn StreamingUpload>,
    faults: Arc<StorageFaults>,
}

#[async_trait]
impl StreamingUpload for FaultyUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        if self.faults.write.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        self.inner.write(data).await
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        if self.faults.finish.load(Ordering::SeqCst) {
            // Bytes stay behind as if the close half-completed.
            self.inner.finish().await?;
            return Err(injected("finish"));
        }
        self.inner.finish().await
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.inner.abort().await
    }
}

/// Registry wrapper that fails selected compensating steps on demand.
#[allow(dead_code)]
#[derive(Default)]
pub struct MetadataFaults {
    pub commit_file: AtomicBool,
    pub delete_file: AtomicBool,
    pub release_file_lock: AtomicBool,
}

#[allow(dead_code)]
pub struct FaultyMetadata {
    inner: Arc<dyn MetadataStore>,
    pub faults: MetadataFaults,
}

#[allow(dead_code)]
impl FaultyMetadata {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            faults: MetadataFaults::default(),
        })
    }

    fn check(flag: &AtomicBool, what: &str) -> MetadataResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(MetadataError::Internal(format!("injected {what} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl FileRepo for FaultyMetadata {
    async fn create_file(&self, user_id: Uuid, file_name: &str) -> MetadataResult<FileRow> {
        self.inner.create_file(user_id, file_name).await
    }

    async fn commit_file(&self, commit: &CommitFile) -> MetadataResult<FileRow> {
        Self::check(&self.faults.commit_file, "commit_file")?;
        self.inner.commit_file(commit).await
    }

    async fn lock_file(&self, user_id: Uuid, file_name: &str) -> MetadataResult<FileRow> {
        self.inner.lock_file(user_id, file_name).await
    }

    async fn release_file_lock(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        expected_updated_at: OffsetDateTime,
    ) -> MetadataResult<FileRow> {
        Self::check(&self.faults.release_file_lock, "release_file_lock")?;
        self.inner
            .release_file_lock(user_id, file_id, expected_updated_at)
            .await
    }

    async fn rename_file(
        &self,
        user_id: Uuid,
        old_name: &str,
        new_name: &str,
    ) -> MetadataResult<FileRow> {
        self.inner.rename_file(user_id, old_name, new_name).await
    }

    async fn delete_file(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        expected_updated_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        Self::check(&self.faults.delete_file, "delete_file")?;
        self.inner
            .delete_file(user_id, file_id, expected_updated_at)
            .await
    }

    async fn unlock_files(&self, user_id: Uuid, file_ids: &[Uuid]) -> MetadataResult<u64> {
        self.inner.unlock_files(user_id, file_ids).await
    }

    async fn delete_files(&self, user_id: Uuid, file_ids: &[Uuid]) -> MetadataResult<u64> {
        self.inner.delete_files(user_id, file_ids).await
    }

    async fn get_file(&self, user_id: Uuid, file_id: Uuid) -> MetadataResult<Option<FileRow>> {
        self.inner.get_file(user_id, file_id).await
    }

    async fn get_file_by_name(
        &self,
        user_id: Uuid,
        file_name: &str,
    ) -> MetadataResult<Option<FileRow>> {
        self.inner.get_file_by_name(user_id, file_name).await
    }

    async fn list_files(&self, user_id: Uuid) -> MetadataResult<Vec<FileRow>> {
        self.inner.list_files(user_id).await
    }

    async fn list_ambiguous_files(&self, user_id: Uuid) -> MetadataResult<Vec<FileRow>> {
        self.inner.list_ambiguous_files(user_id).await
    }
}

#[async_trait]
impl UserRepo for FaultyMetadata {
    async fn create_user(&self, email: &str) -> MetadataResult<UserRow> {
        self.inner.create_user(email).await
    }

    async fn get_user(&self, user_id: Uuid) -> MetadataResult<Option<UserRow>> {
        self.inner.get_user(user_id).await
    }

    async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>> {
        self.inner.get_user_by_email(email).await
    }
}

#[async_trait]
impl SigningKeyRepo for FaultyMetadata {
    async fn count_signing_keys(&self, purpose: &str) -> MetadataResult<u64> {
        self.inner.count_signing_keys(purpose).await
    }

    async fn create_signing_key(&self, key: &SigningKeyRow) -> MetadataResult<()> {
        self.inner.create_signing_key(key).await
    }

    async fn get_active_signing_key(
        &self,
        purpose: &str,
    ) -> MetadataResult<Option<SigningKeyRow>> {
        self.inner.get_active_signing_key(purpose).await
    }
}

#[async_trait]
impl CredentialRepo for FaultyMetadata {
    async fn create_credential(&self, credential: &ApiCredentialRow) -> MetadataResult<()> {
        self.inner.create_credential(credential).await
    }

    async fn get_credential(
        &self,
        credential: &[u8],
    ) -> MetadataResult<Option<ApiCredentialRow>> {
        self.inner.get_credential(credential).await
    }

    async fn delete_credential(&self, credential: &[u8]) -> MetadataResult<()> {
        self.inner.delete_credential(credential).await
    }

    async fn count_credentials(&self, user_id: Uuid) -> MetadataResult<u64> {
        self.inner.count_credentials(user_id).await
    }
}

#[async_trait]
impl MetadataStore for FaultyMetadata {
    async fn migrate(&self) -> MetadataResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }
}

/// Publisher that records requests in memory.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryPublisher {
    pub published: Mutex<Vec<TranscriptRequest>>,
    pub fail: AtomicBool,
}

#[allow(dead_code)]
impl MemoryPublisher {
    pub fn published(&self) -> Vec<TranscriptRequest> {
        self.published.lock().expect("publisher mutex poisoned").clone()
    }
}

#[async_trait]
impl TranscriptPublisher for MemoryPublisher {
    async fn publish(&self, request: &TranscriptRequest) -> ServiceResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Publish("injected publish failure".to_string()));
        }
        self.published
            .lock()
            .expect("publisher mutex poisoned")
            .push(request.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
