//! File record states and object key naming.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Maximum length of a file name in bytes.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Longest extension carried over into a generated object key.
const MAX_EXTENSION_LEN: usize = 16;

/// Whether a record is held by an in-flight operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Locked,
    Unlocked,
}

impl LockStatus {
    /// Map the stored boolean column (`true` means locked).
    pub fn from_locked(locked: bool) -> Self {
        if locked { Self::Locked } else { Self::Unlocked }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked)
    }
}

/// Outcome of the most recent content write for a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    /// A write cycle is in progress (or was interrupted).
    Pending,
    /// Content is durably stored under the record's object key.
    Success,
    /// The write finished but could not be flushed.
    Failed,
}

impl UploadStatus {
    /// Column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Parse the column representation.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(crate::Error::InvalidUploadStatus(other.to_string())),
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combined lock and upload state of a file record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileState {
    pub lock: LockStatus,
    pub upload: UploadStatus,
}

impl FileState {
    /// State of a freshly created placeholder, and of a record re-armed by a lock.
    pub const IN_FLIGHT: Self = Self::new(LockStatus::Locked, UploadStatus::Pending);

    /// The only state in which a record is visible to clients.
    pub const SETTLED: Self = Self::new(LockStatus::Unlocked, UploadStatus::Success);

    pub const fn new(lock: LockStatus, upload: UploadStatus) -> Self {
        Self { lock, upload }
    }

    pub fn is_settled(&self) -> bool {
        *self == Self::SETTLED
    }

    /// Any state left behind by an interrupted operation. Reconciliation
    /// resolves these against the object store.
    pub fn is_ambiguous(&self) -> bool {
        !self.is_settled()
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lock = if self.lock.is_locked() { "locked" } else { "unlocked" };
        write!(f, "{{{lock}, {}}}", self.upload)
    }
}

/// States that reconciliation picks up.
pub const AMBIGUOUS_STATES: [FileState; 5] = [
    FileState::new(LockStatus::Locked, UploadStatus::Success),
    FileState::new(LockStatus::Locked, UploadStatus::Failed),
    FileState::new(LockStatus::Locked, UploadStatus::Pending),
    FileState::new(LockStatus::Unlocked, UploadStatus::Pending),
    FileState::new(LockStatus::Unlocked, UploadStatus::Failed),
];

/// Check that a client-chosen file name is acceptable.
pub fn validate_file_name(name: &str) -> crate::Result<()> {
    if name.trim().is_empty() {
        return Err(crate::Error::InvalidFileName(
            "file name cannot be empty".to_string(),
        ));
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(crate::Error::InvalidFileName(format!(
            "file name exceeds {MAX_FILE_NAME_LEN} bytes"
        )));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(crate::Error::InvalidFileName(format!(
            "file name contains a forbidden character: {name:?}"
        )));
    }
    Ok(())
}

/// Namespace prefix holding every object owned by `user_id`.
pub fn user_prefix(user_id: Uuid) -> String {
    format!("{user_id}/")
}

/// Generate a fresh object key for a file of `user_id`.
///
/// Keys look like `{user_id}/{uuid}{ext}`. The random component makes keys
/// collision-free, so a key never has to be checked before writing. The
/// extension of `file_name` is kept when it is short and alphanumeric.
pub fn object_key_for(user_id: Uuid, file_name: &str) -> String {
    format!(
        "{}{}{}",
        user_prefix(user_id),
        Uuid::new_v4(),
        key_extension(file_name)
    )
}

fn key_extension(file_name: &str) -> String {
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext)
            if !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}
