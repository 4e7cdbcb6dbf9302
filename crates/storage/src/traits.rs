//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

/// A boxed stream of object keys for streaming list operations.
pub type KeyStream = Pin<Box<dyn Stream<Item = StorageResult<String>> + Send>>;

/// Gateway to the blob store holding file content.
///
/// Writes are not transactional with the registry. Callers bracket them with
/// registry locks and compensate on failure.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object atomically.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Start a streaming upload. The object becomes visible only when the
    /// upload is finished.
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>>;

    /// Delete an object. Fails with `NotFound` if it does not exist.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Lazily list keys under a prefix. Each call starts a fresh listing.
    async fn list_stream(&self, prefix: &str) -> StorageResult<KeyStream>;

    /// List keys under a prefix.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.list_stream(prefix).await?.try_collect().await
    }

    /// Static identifier used in logs (e.g. "s3", "filesystem").
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable and configured.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Trait for streaming uploads.
#[async_trait]
pub trait StreamingUpload: Send {
    /// Write a chunk of data.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Flush, publish the object and return the total bytes written.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Discard everything written so far.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}
