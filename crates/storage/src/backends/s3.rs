//! S3-compatible storage backend using the AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::{KeyStream, ObjectStore, StreamingUpload};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tracing::instrument;

/// S3 requires every part except the last to be at least 5 MiB.
const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

const DEFAULT_REGION: &str = "us-east-1";

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

fn sdk_error<E>(err: SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::S3(Box::new(err))
}

fn is_404<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(se) if se.raw().status().as_u16() == 404)
}

/// S3-compatible object store.
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// Without explicit `credentials` (access key id, secret) the ambient AWS
    /// credential chain is used. `force_path_style` is needed for MinIO and
    /// most other S3-compatible services.
    pub async fn new(
        bucket: &str,
        endpoint: Option<String>,
        region: Option<String>,
        prefix: Option<String>,
        credentials: Option<(String, String)>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if bucket.is_empty() {
            return Err(StorageError::Config("s3 bucket must not be empty".to_string()));
        }
        let region = Region::new(region.unwrap_or_else(|| DEFAULT_REGION.to_string()));

        let mut builder = match credentials {
            Some((key_id, secret)) => aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(aws_sdk_s3::config::Credentials::new(
                    key_id,
                    secret,
                    None,
                    None,
                    "scrivener-config",
                )),
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        if let Some(endpoint) = endpoint.as_deref().map(normalize_endpoint) {
            builder = builder.endpoint_url(endpoint);
        }
        if force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
            prefix: prefix
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
        })
    }

    fn full_key(&self, key: &str) -> String {
        full_key(self.prefix.as_deref(), key)
    }
}

/// Bare `host:port` endpoints (e.g. "minio:9000") are taken as plain HTTP.
fn normalize_endpoint(endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

fn full_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}/{key}"),
        None => key.to_string(),
    }
}

fn strip_prefix(prefix: Option<&str>, full_key: &str) -> String {
    match prefix {
        Some(prefix) => full_key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(full_key)
            .to_string(),
        None => full_key.to_string(),
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_404(&err) => Ok(false),
            Err(err) => Err(sdk_error(err)),
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|err| {
                if is_404(&err) {
                    StorageError::NotFound(key.to_string())
                } else {
                    sdk_error(err)
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?;
        Ok(data.into_bytes())
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .body(data.into())
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        let key = self.full_key(key);
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(sdk_error)?;

        let upload_id = output
            .upload_id()
            .ok_or_else(|| StorageError::Config("S3 did not return an upload id".to_string()))?
            .to_string();

        Ok(Box::new(S3Upload {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            key,
            upload_id,
            parts: Vec::new(),
            buffer: BytesMut::new(),
            bytes_written: 0,
        }))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        // DeleteObject succeeds on missing keys.
        if !self.exists(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list_stream(&self, prefix: &str) -> StorageResult<KeyStream> {
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let store_prefix = self.prefix.clone();
        let full_prefix = self.full_key(prefix);

        let stream = async_stream::try_stream! {
            let mut continuation: Option<String> = None;
            loop {
                let output = client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .prefix(&full_prefix)
                    .set_continuation_token(continuation.take())
                    .send()
                    .await
                    .map_err(sdk_error)?;

                for object in output.contents() {
                    if let Some(key) = object.key() {
                        yield strip_prefix(store_prefix.as_deref(), key);
                    }
                }

                match output.next_continuation_token() {
                    Some(token) if output.is_truncated() == Some(true) => {
                        continuation = Some(token.to_string());
                    }
                    _ => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn health_check(&self) -> StorageResult<()> {
        let probe = self.client.head_bucket().bucket(&self.bucket).send();
        tokio::time::timeout(HEALTH_CHECK_TIMEOUT, probe)
            .await
            .map_err(|_| {
                StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "S3 health check timed out",
                ))
            })?
            .map_err(sdk_error)?;
        Ok(())
    }
}

/// Multipart upload. Data is buffered until a full part is available.
struct S3Upload {
    client: Client,
    bucket: String,
    key: String,
    upload_id: String,
    parts: Vec<CompletedPart>,
    buffer: BytesMut,
    bytes_written: u64,
}

impl S3Upload {
    async fn upload_part(&mut self, data: Bytes) -> StorageResult<()> {
        let part_number = self.parts.len() as i32 + 1;
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .part_number(part_number)
            .body(data.into())
            .send()
            .await
            .map_err(sdk_error)?;

        self.parts.push(
            CompletedPart::builder()
                .e_tag(output.e_tag().unwrap_or_default())
                .part_number(part_number)
                .build(),
        );
        Ok(())
    }

    async fn abort_multipart(&self) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}

#[async_trait]
impl StreamingUpload for S3Upload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.bytes_written += data.len() as u64;
        self.buffer.extend_from_slice(&data);

        while self.buffer.len() >= MIN_PART_SIZE {
            let part = self.buffer.split_to(MIN_PART_SIZE).freeze();
            self.upload_part(part).await?;
        }
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        if !self.buffer.is_empty() {
            let last = self.buffer.split().freeze();
            self.upload_part(last).await?;
        }

        // Multipart uploads cannot be empty.
        if self.parts.is_empty() {
            if let Err(e) = self.abort_multipart().await {
                tracing::warn!(key = %self.key, error = %e, "failed to abort empty multipart upload");
            }
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .body(Bytes::new().into())
                .send()
                .await
                .map_err(sdk_error)?;
            return Ok(0);
        }

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(std::mem::take(&mut self.parts)))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(self.bytes_written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.abort_multipart().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_key_and_strip_prefix() {
        assert_eq!(full_key(Some("scrivener"), "u/a.wav"), "scrivener/u/a.wav");
        assert_eq!(full_key(None, "u/a.wav"), "u/a.wav");

        assert_eq!(strip_prefix(Some("scrivener"), "scrivener/u/a.wav"), "u/a.wav");
        assert_eq!(strip_prefix(None, "u/a.wav"), "u/a.wav");
        // Keys outside the configured prefix are returned untouched.
        assert_eq!(strip_prefix(Some("scrivener"), "other/u/a.wav"), "other/u/a.wav");
        assert_eq!(
            strip_prefix(Some("scrivener"), "scrivenerx/u/a.wav"),
            "scrivenerx/u/a.wav"
        );
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("minio:9000"), "http://minio:9000");
        assert_eq!(normalize_endpoint("https://s3.example.com"), "https://s3.example.com");
        assert_eq!(normalize_endpoint("HTTP://minio:9000"), "HTTP://minio:9000");
    }

    #[tokio::test]
    async fn test_new_trims_prefix_slashes() {
        let backend = S3Backend::new(
            "recordings",
            Some("localhost:9000".to_string()),
            None,
            Some("/scrivener/".to_string()),
            Some(("access".to_string(), "secret".to_string())),
            true,
        )
        .await
        .unwrap();

        assert_eq!(backend.full_key("u/a.wav"), "scrivener/u/a.wav");
        assert!(!format!("{backend:?}").contains("secret"));
    }

    #[tokio::test]
    async fn test_new_rejects_empty_bucket() {
        let result = S3Backend::new(
            "",
            None,
            None,
            None,
            Some(("access".to_string(), "secret".to_string())),
            false,
        )
        .await;
        assert!(matches!(result, Err(StorageError::Config(_))));
    }
}
