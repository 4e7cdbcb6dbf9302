//! Metadata store test utilities.

use scrivener_metadata::{MetadataError, MetadataResult, MetadataStore, PostgresStore, SqliteStore};
use sqlx::{Pool, Postgres as SqlxPostgres, Sqlite};
use std::sync::Arc;
use tempfile::TempDir;
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

/// A SQLite registry in a temp directory, removed on drop.
#[allow(dead_code)]
pub struct TestMetadata {
    pub store: Arc<dyn MetadataStore>,
    sqlite_store: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestMetadata {
    pub async fn new() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir()?;
        let store = Arc::new(SqliteStore::new(temp_dir.path().join("registry.db")).await?);

        Ok(Self {
            store: store.clone(),
            sqlite_store: store,
            _temp_dir: temp_dir,
        })
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        self.sqlite_store.pool()
    }

    /// Put a record into an arbitrary state, bypassing the registry guards.
    pub async fn force_state(
        &self,
        file_id: Uuid,
        locked: bool,
        upload_status: &str,
        object_key: Option<&str>,
    ) {
        sqlx::query(
            "UPDATE files SET lock_status = ?, upload_status = ?, object_key = ? WHERE file_id = ?",
        )
        .bind(locked)
        .bind(upload_status)
        .bind(object_key)
        .bind(file_id)
        .execute(self.pool())
        .await
        .expect("force_state failed");
    }
}

/// A PostgreSQL registry running in a testcontainer.
#[allow(dead_code)]
pub struct PostgresTestMetadata {
    pub store: Arc<dyn MetadataStore>,
    postgres_store: Arc<PostgresStore>,
    _container: ContainerAsync<Postgres>,
}

#[allow(dead_code)]
impl PostgresTestMetadata {
    pub async fn new() -> MetadataResult<Self> {
        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .map_err(|e| MetadataError::Internal(format!("failed to start PostgreSQL container: {e}")))?;

        let host = container
            .get_host()
            .await
            .map_err(|e| MetadataError::Internal(e.to_string()))?;
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .map_err(|e| MetadataError::Internal(e.to_string()))?;

        // Default credentials of the postgres module.
        let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");
        let store = Arc::new(PostgresStore::from_url(&url, 5, None).await?);

        Ok(Self {
            store: store.clone(),
            postgres_store: store,
            _container: container,
        })
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    pub fn pool(&self) -> &Pool<SqlxPostgres> {
        self.postgres_store.pool()
    }
}

/// Run a test against SQLite and, unless `SKIP_POSTGRES_TESTS` is set or
/// Docker is unavailable, PostgreSQL.
#[allow(dead_code)]
pub async fn run_metadata_test_both<F, Fut>(test_fn: F)
where
    F: Fn(Arc<dyn MetadataStore>) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    let sqlite = TestMetadata::new()
        .await
        .expect("Failed to create SQLite test metadata");
    test_fn.clone()(sqlite.store()).await;

    if std::env::var("SKIP_POSTGRES_TESTS").is_err() {
        match PostgresTestMetadata::new().await {
            Ok(postgres) => test_fn(postgres.store()).await,
            Err(err) => eprintln!("Skipping PostgreSQL metadata tests: {err}"),
        }
    }
}
