//! Transcript request payload.
//!
//! Published once per accepted request; the transcription worker consumes it
//! and fetches the object itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRequest {
    /// Object key of the uploaded recording.
    pub object_key: String,
    /// Owner of the file.
    pub user_id: Uuid,
    /// Where the finished transcript should be announced.
    pub user_email: String,
}

impl TranscriptRequest {
    /// Encode as a single-line JSON message.
    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Decode a message produced by [`TranscriptRequest::to_json`].
    pub fn from_json(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let request = TranscriptRequest {
            object_key: "u/1.wav".to_string(),
            user_id: Uuid::nil(),
            user_email: "ada@example.com".to_string(),
        };
        let json: serde_json::Value =
            serde_json::from_slice(&request.to_json().unwrap()).unwrap();

        assert_eq!(json["objectKey"], "u/1.wav");
        assert_eq!(json["userId"], Uuid::nil().to_string());
        assert_eq!(json["userEmail"], "ada@example.com");
    }

    #[test]
    fn test_message_is_single_line() {
        let request = TranscriptRequest {
            object_key: "k".to_string(),
            user_id: Uuid::new_v4(),
            user_email: "line\nbreak@example.com".to_string(),
        };
        let bytes = request.to_json().unwrap();
        assert!(!bytes.contains(&b'\n'));
        assert_eq!(TranscriptRequest::from_json(&bytes).unwrap(), request);
    }
}
