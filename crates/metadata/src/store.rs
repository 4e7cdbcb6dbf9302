//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{CredentialRepo, FileRepo, SigningKeyRepo, UserRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    FileRepo + UserRepo + SigningKeyRepo + CredentialRepo + Send + Sync
{
    /// Create tables and indexes if they do not exist.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // One connection serializes every transaction, which is what makes the
        // read-check-write registry transitions atomic on SQLite.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "Opened SQLite registry");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::files::{
        check_ambiguous, check_commit, check_has_object, check_held, check_settled, columns,
        missing_file,
    };
    use scrivener_core::version::next_version;
    use scrivener_core::{LockStatus, UploadStatus};
    use sqlx::Transaction;
    use time::OffsetDateTime;
    use uuid::Uuid;

    async fn file_by_id(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: Uuid,
        file_id: Uuid,
    ) -> MetadataResult<FileRow> {
        sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE file_id = ? AND user_id = ?")
            .bind(file_id)
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| missing_file(user_id, file_id))
    }

    async fn file_by_name(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: Uuid,
        file_name: &str,
    ) -> MetadataResult<FileRow> {
        sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE user_id = ? AND file_name = ?")
            .bind(user_id)
            .bind(file_name)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| missing_file(user_id, file_name))
    }

    /// Move a row to a new lock/upload state and stamp a fresh version.
    async fn set_state(
        tx: &mut Transaction<'_, Sqlite>,
        row: &FileRow,
        lock: LockStatus,
        upload: UploadStatus,
    ) -> MetadataResult<FileRow> {
        let (locked, status) = columns(lock, upload);
        let version = next_version(Some(row.updated_at), OffsetDateTime::now_utc());
        let updated = sqlx::query_as::<_, FileRow>(
            r#"
            UPDATE files SET lock_status = ?, upload_status = ?, updated_at = ?
            WHERE file_id = ? AND user_id = ?
            RETURNING *
            "#,
        )
        .bind(locked)
        .bind(status)
        .bind(version)
        .bind(row.file_id)
        .bind(row.user_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(updated)
    }

    #[async_trait]
    impl FileRepo for SqliteStore {
        async fn create_file(&self, user_id: Uuid, file_name: &str) -> MetadataResult<FileRow> {
            let (locked, status) = columns(LockStatus::Locked, UploadStatus::Pending);
            let now = OffsetDateTime::now_utc();
            let version = next_version(None, now);

            sqlx::query_as::<_, FileRow>(
                r#"
                INSERT INTO files (
                    file_id, user_id, file_name, object_key, lock_status,
                    upload_status, created_at, updated_at
                ) VALUES (?, ?, ?, NULL, ?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(file_name)
            .bind(locked)
            .bind(status)
            .bind(now)
            .bind(version)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MetadataError::from_unique(e, format!("file {file_name}")))
        }

        async fn commit_file(&self, commit: &CommitFile) -> MetadataResult<FileRow> {
            let mut tx = self.pool.begin().await?;

            let row = file_by_id(&mut tx, commit.user_id, commit.file_id).await?;
            check_commit(&row, commit)?;

            let (locked, status) = columns(LockStatus::Unlocked, commit.status);
            let version = next_version(Some(row.updated_at), OffsetDateTime::now_utc());
            let updated = sqlx::query_as::<_, FileRow>(
                r#"
                UPDATE files
                SET object_key = ?, lock_status = ?, upload_status = ?, updated_at = ?
                WHERE file_id = ? AND user_id = ?
                RETURNING *
                "#,
            )
            .bind(&commit.object_key)
            .bind(locked)
            .bind(status)
            .bind(version)
            .bind(commit.file_id)
            .bind(commit.user_id)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(updated)
        }

        async fn lock_file(&self, user_id: Uuid, file_name: &str) -> MetadataResult<FileRow> {
            let mut tx = self.pool.begin().await?;

            let row = file_by_name(&mut tx, user_id, file_name).await?;
            check_settled(&row)?;
            let locked = set_state(&mut tx, &row, LockStatus::Locked, UploadStatus::Pending).await?;

            tx.commit().await?;
            Ok(locked)
        }

        async fn release_file_lock(
            &self,
            user_id: Uuid,
            file_id: Uuid,
            expected_updated_at: OffsetDateTime,
        ) -> MetadataResult<FileRow> {
            let mut tx = self.pool.begin().await?;

            let row = file_by_id(&mut tx, user_id, file_id).await?;
            check_held(&row, expected_updated_at)?;
            check_has_object(&row)?;
            let released =
                set_state(&mut tx, &row, LockStatus::Unlocked, UploadStatus::Success).await?;

            tx.commit().await?;
            Ok(released)
        }

        async fn rename_file(
            &self,
            user_id: Uuid,
            old_name: &str,
            new_name: &str,
        ) -> MetadataResult<FileRow> {
            let mut tx = self.pool.begin().await?;

            let row = file_by_name(&mut tx, user_id, old_name).await?;
            check_settled(&row)?;

            let version = next_version(Some(row.updated_at), OffsetDateTime::now_utc());
            let renamed = sqlx::query_as::<_, FileRow>(
                r#"
                UPDATE files SET file_name = ?, updated_at = ?
                WHERE file_id = ? AND user_id = ?
                RETURNING *
                "#,
            )
            .bind(new_name)
            .bind(version)
            .bind(row.file_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| MetadataError::from_unique(e, format!("file {new_name}")))?;

            tx.commit().await?;
            Ok(renamed)
        }

        async fn delete_file(
            &self,
            user_id: Uuid,
            file_id: Uuid,
            expected_updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            let row = file_by_id(&mut tx, user_id, file_id).await?;
            check_held(&row, expected_updated_at)?;

            sqlx::query("DELETE FROM files WHERE file_id = ? AND user_id = ?")
                .bind(file_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(())
        }

        async fn unlock_files(&self, user_id: Uuid, file_ids: &[Uuid]) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;

            for file_id in file_ids {
                let row = file_by_id(&mut tx, user_id, *file_id).await?;
                check_ambiguous(&row)?;
                check_has_object(&row)?;
                set_state(&mut tx, &row, LockStatus::Unlocked, UploadStatus::Success).await?;
            }

            tx.commit().await?;
            Ok(file_ids.len() as u64)
        }

        async fn delete_files(&self, user_id: Uuid, file_ids: &[Uuid]) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;

            for file_id in file_ids {
                let row = file_by_id(&mut tx, user_id, *file_id).await?;
                check_ambiguous(&row)?;
                sqlx::query("DELETE FROM files WHERE file_id = ? AND user_id = ?")
                    .bind(file_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;
            Ok(file_ids.len() as u64)
        }

        async fn get_file(&self, user_id: Uuid, file_id: Uuid) -> MetadataResult<Option<FileRow>> {
            let row = sqlx::query_as::<_, FileRow>(
                "SELECT * FROM files WHERE file_id = ? AND user_id = ?",
            )
            .bind(file_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_file_by_name(
            &self,
            user_id: Uuid,
            file_name: &str,
        ) -> MetadataResult<Option<FileRow>> {
            let row = sqlx::query_as::<_, FileRow>(
                "SELECT * FROM files WHERE user_id = ? AND file_name = ?",
            )
            .bind(user_id)
            .bind(file_name)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_files(&self, user_id: Uuid) -> MetadataResult<Vec<FileRow>> {
            let (locked, status) = columns(LockStatus::Unlocked, UploadStatus::Success);
            let rows = sqlx::query_as::<_, FileRow>(
                r#"
                SELECT * FROM files
                WHERE user_id = ? AND lock_status = ? AND upload_status = ?
                ORDER BY file_name
                "#,
            )
            .bind(user_id)
            .bind(locked)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_ambiguous_files(&self, user_id: Uuid) -> MetadataResult<Vec<FileRow>> {
            let (_, settled) = columns(LockStatus::Unlocked, UploadStatus::Success);
            let rows = sqlx::query_as::<_, FileRow>(
                r#"
                SELECT * FROM files
                WHERE user_id = ? AND (lock_status = ? OR upload_status <> ?)
                ORDER BY created_at
                "#,
            )
            .bind(user_id)
            .bind(true)
            .bind(settled)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, email: &str) -> MetadataResult<UserRow> {
            sqlx::query_as::<_, UserRow>(
                "INSERT INTO users (user_id, email, created_at) VALUES (?, ?, ?) RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(email)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MetadataError::from_unique(e, format!("user {email}")))
        }

        async fn get_user(&self, user_id: Uuid) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl SigningKeyRepo for SqliteStore {
        async fn count_signing_keys(&self, purpose: &str) -> MetadataResult<u64> {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM signing_keys WHERE purpose = ?")
                    .bind(purpose)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(count as u64)
        }

        async fn create_signing_key(&self, key: &SigningKeyRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO signing_keys (
                    key_id, purpose, public_key, private_key, is_active, created_at
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(key.key_id)
            .bind(&key.purpose)
            .bind(&key.public_key)
            .bind(&key.private_key)
            .bind(key.is_active)
            .bind(key.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::from_unique(e, format!("signing key {}", key.purpose)))?;
            Ok(())
        }

        async fn get_active_signing_key(
            &self,
            purpose: &str,
        ) -> MetadataResult<Option<SigningKeyRow>> {
            let row = sqlx::query_as::<_, SigningKeyRow>(
                "SELECT * FROM signing_keys WHERE purpose = ? AND is_active = 1",
            )
            .bind(purpose)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl CredentialRepo for SqliteStore {
        async fn create_credential(&self, credential: &ApiCredentialRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO api_credentials (
                    credential_id, user_id, credential, signature, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(credential.credential_id)
            .bind(credential.user_id)
            .bind(&credential.credential)
            .bind(&credential.signature)
            .bind(credential.created_at)
            .bind(credential.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::from_unique(e, "api credential"))?;
            Ok(())
        }

        async fn get_credential(
            &self,
            credential: &[u8],
        ) -> MetadataResult<Option<ApiCredentialRow>> {
            let row = sqlx::query_as::<_, ApiCredentialRow>(
                "SELECT * FROM api_credentials WHERE credential = ?",
            )
            .bind(credential)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn delete_credential(&self, credential: &[u8]) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM api_credentials WHERE credential = ?")
                .bind(credential)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NoRecordFound("api credential".to_string()));
            }
            Ok(())
        }

        async fn count_credentials(&self, user_id: Uuid) -> MetadataResult<u64> {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM api_credentials WHERE user_id = ?")
                    .bind(user_id)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(count as u64)
        }
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id BLOB PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    file_id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    file_name TEXT NOT NULL,
    object_key TEXT,
    lock_status INTEGER NOT NULL,
    upload_status TEXT NOT NULL CHECK (upload_status IN ('PENDING', 'SUCCESS', 'FAILED')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (user_id, file_name)
);
CREATE INDEX IF NOT EXISTS idx_files_user_state ON files(user_id, lock_status, upload_status);

CREATE TABLE IF NOT EXISTS signing_keys (
    key_id BLOB PRIMARY KEY,
    purpose TEXT NOT NULL UNIQUE,
    public_key TEXT NOT NULL,
    private_key BLOB NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS api_credentials (
    credential_id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    credential BLOB NOT NULL UNIQUE,
    signature BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_api_credentials_user ON api_credentials(user_id);
"#;
