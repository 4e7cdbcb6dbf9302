//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A configuration value that must never show up in logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for objects.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix inside the bucket.
        prefix: Option<String>,
        /// Falls back to the default AWS credential chain when unset.
        access_key_id: Option<String>,
        /// Prefer SCRIVENER_STORAGE__SECRET_ACCESS_KEY over the config file.
        secret_access_key: Option<Secret>,
        /// Path-style URLs (`endpoint/bucket/key`), needed by MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/objects"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("filesystem storage requires a non-empty path".to_string())
            }
            StorageConfig::S3 { bucket, .. } if bucket.is_empty() => {
                Err("s3 storage requires a bucket".to_string())
            }
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            _ => Ok(()),
        }
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database file.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL. Takes precedence over the individual fields.
        url: Option<Secret>,
        host: Option<String>,
        #[serde(default = "default_pg_port")]
        port: u16,
        username: Option<String>,
        password: Option<Secret>,
        database: Option<String>,
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> u16 {
    5432
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/registry.db"),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                max_connections,
                ..
            } => {
                if *max_connections == 0 {
                    return Err("postgres max_connections must be at least 1".to_string());
                }
                match (url.as_ref(), host.as_ref(), database.as_ref()) {
                    (Some(_), _, _) | (None, Some(_), Some(_)) => Ok(()),
                    (None, None, _) => Err(
                        "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                    ),
                    (None, Some(_), None) => Err(
                        "postgres config requires 'database' when using individual fields"
                            .to_string(),
                    ),
                }
            }
        }
    }
}

/// Signing key vault configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Passphrase protecting private keys at rest.
    pub passphrase: Secret,
    /// Purpose of the key used to sign API credentials.
    #[serde(default = "default_key_purpose")]
    pub key_purpose: String,
}

fn default_key_purpose() -> String {
    crate::DEFAULT_KEY_PURPOSE.to_string()
}

impl VaultConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.passphrase.is_empty() {
            return Err("vault.passphrase must not be empty".to_string());
        }
        if self.key_purpose.trim().is_empty() {
            return Err("vault.key_purpose must not be empty".to_string());
        }
        Ok(())
    }
}

/// Upload limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Largest accepted file, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_max_file_size() -> u64 {
    crate::DEFAULT_MAX_FILE_SIZE
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}

/// Where transcript requests are published.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueueConfig {
    /// Transcript requests are rejected.
    #[default]
    Disabled,
    /// Append requests to a local spool file read by the worker.
    Spool {
        /// Spool file path.
        path: PathBuf,
    },
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Object storage backend.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Registry database.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Signing key vault (required).
    pub vault: VaultConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    /// Transcript request queue.
    #[serde(default)]
    pub queue: QueueConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage, SQLite metadata,
    /// a fixed passphrase and no transcript queue.
    pub fn for_testing() -> Self {
        Self {
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            vault: VaultConfig {
                passphrase: Secret::new("test-passphrase"),
                key_purpose: default_key_purpose(),
            },
            upload: UploadConfig::default(),
            queue: QueueConfig::Disabled,
        }
    }

    /// Validate every section, reporting the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.metadata.validate()?;
        self.vault.validate()?;
        if self.upload.max_file_size == 0 {
            return Err("upload.max_file_size must be greater than zero".to_string());
        }
        if let QueueConfig::Spool { path } = &self.queue
            && path.as_os_str().is_empty()
        {
            return Err("queue.path must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = VaultConfig {
            passphrase: Secret::new("hunter2"),
            key_purpose: "jwt".to_string(),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_app_config_defaults_from_json() {
        let json = r#"{"vault": {"passphrase": "pw"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.vault.key_purpose, "jwt");
        assert_eq!(config.vault.passphrase.expose(), "pw");
        assert_eq!(config.upload.max_file_size, 50 * 1024 * 1024);
        assert!(matches!(config.queue, QueueConfig::Disabled));
        assert!(matches!(config.storage, StorageConfig::Filesystem { .. }));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_vault_requires_passphrase() {
        let mut config = AppConfig::for_testing();
        config.vault.passphrase = Secret::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_queue_spool_from_json() {
        let json = r#"{"type": "spool", "path": "/var/spool/scrivener.jsonl"}"#;
        let queue: QueueConfig = serde_json::from_str(json).unwrap();
        match queue {
            QueueConfig::Spool { path } => {
                assert_eq!(path, PathBuf::from("/var/spool/scrivener.jsonl"))
            }
            QueueConfig::Disabled => panic!("expected spool queue"),
        }
    }

    #[test]
    fn test_storage_config_s3_partial_credentials_rejected() {
        let config = StorageConfig::S3 {
            bucket: "recordings".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("access".to_string()),
            secret_access_key: None,
            force_path_style: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_postgres_config_requires_location() {
        let json = r#"{"type": "postgres", "host": "db"}"#;
        let config: MetadataConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"{"type": "postgres", "url": "postgres://u:p@db/registry"}"#;
        let config: MetadataConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert!(!format!("{config:?}").contains("u:p"));
    }
}
