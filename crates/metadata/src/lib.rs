//! Metadata store abstraction and implementations for scrivener.
//!
//! This crate owns the relational side of the system:
//! - File records and their lock/upload state machine
//! - Users
//! - Encrypted signing key material
//! - Issued API credentials

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use postgres::{PgParams, PostgresStore};
pub use store::{MetadataStore, SqliteStore};

use scrivener_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        MetadataConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
        } => {
            let store = if let Some(url) = url {
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url.expose(), *max_connections, *statement_timeout_ms)
                    .await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                let params = PgParams {
                    host,
                    port: *port,
                    username: username.as_deref(),
                    password: password.as_ref().map(|p| p.expose()),
                    database,
                    ssl_mode: *ssl_mode,
                };
                PostgresStore::from_params(params, *max_connections, *statement_timeout_ms)
                    .await?
            } else {
                return Err(MetadataError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
