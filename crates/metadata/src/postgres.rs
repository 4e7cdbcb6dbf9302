//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::files::{
    check_ambiguous, check_commit, check_has_object, check_held, check_settled, columns,
    missing_file,
};
use crate::repos::{CredentialRepo, FileRepo, SigningKeyRepo, UserRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use scrivener_core::config::PgSslMode;
use scrivener_core::version::next_version;
use scrivener_core::{LockStatus, UploadStatus};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres, Transaction};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// Connection parameters used when no URL is configured.
#[derive(Clone)]
pub struct PgParams<'a> {
    pub host: &'a str,
    pub port: u16,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub database: &'a str,
    pub ssl_mode: Option<PgSslMode>,
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Connect using a full connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Connect using individual parameters, so the password can come from
    /// its own environment variable.
    pub async fn from_params(
        params: PgParams<'_>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(params.host)
            .port(params.port)
            .database(params.database);

        if let Some(user) = params.username {
            opts = opts.username(user);
        }
        if let Some(pass) = params.password {
            opts = opts.password(pass);
        }
        if let Some(mode) = params.ssl_mode {
            opts = opts.ssl_mode(match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            });
        }

        tracing::info!(
            host = params.host,
            port = params.port,
            database = params.database,
            username = params.username.unwrap_or("<none>"),
            ssl_mode = ?params.ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{timeout_ms}ms"))]);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Prepared statements cannot hold more than one command.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Row reads inside transitions take a row lock, so a concurrent writer waits
// and then sees the new version token instead of overwriting it.

async fn file_by_id(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    file_id: Uuid,
) -> MetadataResult<FileRow> {
    sqlx::query_as::<_, FileRow>(
        "SELECT * FROM files WHERE file_id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(file_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| missing_file(user_id, file_id))
}

async fn file_by_name(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    file_name: &str,
) -> MetadataResult<FileRow> {
    sqlx::query_as::<_, FileRow>(
        "SELECT * FROM files WHERE user_id = $1 AND file_name = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(file_name)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| missing_file(user_id, file_name))
}

async fn set_state(
    tx: &mut Transaction<'_, Postgres>,
    row: &FileRow,
    lock: LockStatus,
    upload: UploadStatus,
) -> MetadataResult<FileRow> {
    let (locked, status) = columns(lock, upload);
    let version = next_version(Some(row.updated_at), OffsetDateTime::now_utc());
    let updated = sqlx::query_as::<_, FileRow>(
        r#"
        UPDATE files SET lock_status = $1, upload_status = $2, updated_at = $3
        WHERE file_id = $4 AND user_id = $5
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
impl FileRepo for PostgresStore {
    async fn create_file(&self, user_id: Uuid, file_name: &str) -> MetadataResult<FileRow> {
        let (locked, status) = columns(LockStatus::Locked, UploadStatus::Pending);
        let now = OffsetDateTime::now_utc();
        let version = next_version(None, now);

        sqlx::query_as::<_, FileRow>(
            r#"
            INSERT INTO files (
                file_id, user_id, file_name, object_key, lock_status,
                upload_status, created_at, updated_at
            ) VALUES ($1, $2, $3, NULL, $4, $5, $6, $7)
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
            SET object_key = $1, lock_status = $2, upload_status = $3, updated_at = $4
            WHERE file_id = $5 AND user_id = $6
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
        let released = set_state(&mut tx, &row, LockStatus::Unlocked, UploadStatus::Success).await?;

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
            UPDATE files SET file_name = $1, updated_at = $2
            WHERE file_id = $3 AND user_id = $4
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

        sqlx::query("DELETE FROM files WHERE file_id = $1 AND user_id = $2")
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
            sqlx::query("DELETE FROM files WHERE file_id = $1 AND user_id = $2")
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
            "SELECT * FROM files WHERE file_id = $1 AND user_id = $2",
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
            "SELECT * FROM files WHERE user_id = $1 AND file_name = $2",
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
            WHERE user_id = $1 AND lock_status = $2 AND upload_status = $3
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
            WHERE user_id = $1 AND (lock_status OR upload_status <> $2)
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .bind(settled)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl UserRepo for PostgresStore {
    async fn create_user(&self, email: &str) -> MetadataResult<UserRow> {
        sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (user_id, email, created_at) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MetadataError::from_unique(e, format!("user {email}")))
    }

    async fn get_user(&self, user_id: Uuid) -> MetadataResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl SigningKeyRepo for PostgresStore {
    async fn count_signing_keys(&self, purpose: &str) -> MetadataResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM signing_keys WHERE purpose = $1")
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
            ) VALUES ($1, $2, $3, $4, $5, $6)
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

    async fn get_active_signing_key(&self, purpose: &str) -> MetadataResult<Option<SigningKeyRow>> {
        let row = sqlx::query_as::<_, SigningKeyRow>(
            "SELECT * FROM signing_keys WHERE purpose = $1 AND is_active",
        )
        .bind(purpose)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl CredentialRepo for PostgresStore {
    async fn create_credential(&self, credential: &ApiCredentialRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO api_credentials (
                credential_id, user_id, credential, signature, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
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

    async fn get_credential(&self, credential: &[u8]) -> MetadataResult<Option<ApiCredentialRow>> {
        let row = sqlx::query_as::<_, ApiCredentialRow>(
            "SELECT * FROM api_credentials WHERE credential = $1",
        )
        .bind(credential)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_credential(&self, credential: &[u8]) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM api_credentials WHERE credential = $1")
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
            sqlx::query_scalar("SELECT COUNT(*) FROM api_credentials WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}
