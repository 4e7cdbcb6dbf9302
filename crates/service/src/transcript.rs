//! Transcript requests.

use crate::error::ServiceResult;
use crate::publisher::TranscriptPublisher;
use scrivener_core::TranscriptRequest;
use scrivener_metadata::{MetadataError, MetadataStore};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Announces transcript work for settled files.
pub struct TranscriptService {
    metadata: Arc<dyn MetadataStore>,
    publisher: Arc<dyn TranscriptPublisher>,
}

impl TranscriptService {
    pub fn new(metadata: Arc<dyn MetadataStore>, publisher: Arc<dyn TranscriptPublisher>) -> Self {
        Self {
            metadata,
            publisher,
        }
    }

    /// Publish a request for `file_name`. Nothing is published unless the
    /// user exists and the file is settled with stored content.
    #[instrument(skip(self), fields(user_id = %user_id, publisher = self.publisher.name()))]
    pub async fn request(&self, user_id: Uuid, file_name: &str) -> ServiceResult<TranscriptRequest> {
        let user = self
            .metadata
            .get_user(user_id)
            .await?
            .ok_or_else(|| MetadataError::NoRecordFound(format!("user {user_id}")))?;

        let file = self
            .metadata
            .get_file_by_name(user_id, file_name)
            .await?
            .ok_or_else(|| MetadataError::NoRecordFound(format!("file {file_name}")))?;

        let state = file.state()?;
        if state.lock.is_locked() {
            return Err(MetadataError::ResourceLocked(format!("file {file_name}")).into());
        }
        let object_key = match file.object_key {
            Some(key) if state.is_settled() => key,
            _ => {
                return Err(MetadataError::UploadIssue(format!(
                    "file {file_name} is {}",
                    state
                ))
                .into());
            }
        };

        let request = TranscriptRequest {
            object_key,
            user_id,
            user_email: user.email,
        };
        self.publisher.publish(&request).await?;
        tracing::info!(file_id = %file.file_id, "transcript requested");
        Ok(request)
    }
}
