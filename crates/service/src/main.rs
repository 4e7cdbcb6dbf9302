//! Scrivener command-line binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use scrivener_core::config::AppConfig;
use scrivener_metadata::models::FileRow;
use scrivener_service::{AppState, KeyVault, ServiceError};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use tokio_util::io::ReaderStream;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Scrivener - user file registry backed by an object store
#[derive(Parser, Debug)]
#[command(name = "scrivener")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SCRIVENER_CONFIG",
        default_value = "config/scrivener.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the signing key if it does not exist yet
    InitKeys,
    /// Create a user and print its first credential
    Register {
        #[arg(long)]
        email: String,
    },
    /// Revoke a credential
    Revoke {
        #[arg(long)]
        credential: String,
    },
    /// Upload a file
    Upload {
        #[arg(long, env = "SCRIVENER_CREDENTIAL")]
        credential: String,
        /// Name to store the file under (defaults to the file's own name)
        #[arg(long)]
        name: Option<String>,
        path: PathBuf,
    },
    /// List settled files
    List {
        #[arg(long, env = "SCRIVENER_CREDENTIAL")]
        credential: String,
    },
    /// Rename a file
    Rename {
        #[arg(long, env = "SCRIVENER_CREDENTIAL")]
        credential: String,
        old: String,
        new: String,
    },
    /// Delete a file and its content
    Delete {
        #[arg(long, env = "SCRIVENER_CREDENTIAL")]
        credential: String,
        name: String,
    },
    /// Repair records left in doubt by interrupted operations
    Sync {
        #[arg(long, env = "SCRIVENER_CREDENTIAL")]
        credential: String,
    },
    /// Request a transcript of a file
    Transcript {
        #[arg(long, env = "SCRIVENER_CREDENTIAL")]
        credential: String,
        name: String,
    },
    /// Check that the registry and the object store are reachable
    Check,
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        tracing::debug!(config_path = %path.display(), "loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!(config_path = %path.display(), "no config file, using environment only");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SCRIVENER_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

fn file_json(row: &FileRow) -> Value {
    json!({
        "file_id": row.file_id,
        "file_name": row.file_name,
        "object_key": row.object_key,
        "locked": row.lock_status,
        "upload_status": row.upload_status,
        "updated_at": row.updated_at.format(&Rfc3339).ok(),
    })
}

async fn authenticate(state: &AppState, credential: &str) -> Result<Uuid, ServiceError> {
    state.credentials().authenticate(credential).await
}

async fn run(state: &AppState, command: Command) -> Result<Value, ServiceError> {
    match command {
        Command::Register { email } => {
            let (user, credential) = state.credentials().register(&email).await?;
            Ok(json!({
                "user_id": user.user_id,
                "email": user.email,
                "credential": credential,
            }))
        }
        Command::Revoke { credential } => {
            state.credentials().revoke(&credential).await?;
            Ok(json!({ "revoked": true }))
        }
        Command::Upload {
            credential,
            name,
            path,
        } => {
            let user_id = authenticate(state, &credential).await?;
            let name = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        ServiceError::InvalidInput(format!("{} has no file name", path.display()))
                    })?,
            };
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| ServiceError::InvalidInput(format!("{}: {e}", path.display())))?;
            let row = state
                .files()
                .upload(user_id, &name, ReaderStream::new(file))
                .await?;
            Ok(file_json(&row))
        }
        Command::List { credential } => {
            let user_id = authenticate(state, &credential).await?;
            let files = state.files().list(user_id).await?;
            Ok(Value::Array(files.iter().map(file_json).collect()))
        }
        Command::Rename {
            credential,
            old,
            new,
        } => {
            let user_id = authenticate(state, &credential).await?;
            let row = state.files().rename(user_id, &old, &new).await?;
            Ok(file_json(&row))
        }
        Command::Delete { credential, name } => {
            let user_id = authenticate(state, &credential).await?;
            state.files().delete(user_id, &name).await?;
            Ok(json!({ "deleted": name }))
        }
        Command::Sync { credential } => {
            let user_id = authenticate(state, &credential).await?;
            let outcome = state.reconciler().sync(user_id).await?;
            serde_json::to_value(outcome).map_err(|e| ServiceError::Internal(e.to_string()))
        }
        Command::Transcript { credential, name } => {
            let user_id = authenticate(state, &credential).await?;
            let request = state.transcripts().request(user_id, &name).await?;
            serde_json::to_value(request).map_err(|e| ServiceError::Internal(e.to_string()))
        }
        Command::InitKeys | Command::Check => Err(ServiceError::Internal(
            "command handled before state assembly".to_string(),
        )),
    }
}

async fn init_keys(config: &AppConfig) -> Result<Value> {
    let metadata = scrivener_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata.migrate().await.context("failed to migrate registry")?;

    let vault = KeyVault::new(
        metadata,
        config.vault.passphrase.clone(),
        config.vault.key_purpose.clone(),
    );
    let generated = vault
        .ensure_initialized()
        .await
        .context("failed to initialize signing key")?;
    vault
        .load_active()
        .await
        .context("signing key exists but cannot be opened with the configured passphrase")?;

    Ok(json!({ "purpose": vault.purpose(), "generated": generated }))
}

async fn check(config: &AppConfig) -> Result<Value> {
    let metadata = match scrivener_metadata::from_config(&config.metadata).await {
        Ok(store) => store.health_check().await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    let storage = match scrivener_storage::from_config(&config.storage).await {
        Ok(store) => store.health_check().await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let status = |r: &std::result::Result<(), String>| match r {
        Ok(()) => json!({ "ok": true }),
        Err(e) => json!({ "ok": false, "error": e }),
    };
    let report = json!({ "metadata": status(&metadata), "storage": status(&storage) });

    if metadata.is_err() || storage.is_err() {
        anyhow::bail!("health check failed: {report}");
    }
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args.config)?;

    let output = match args.command {
        Command::InitKeys => init_keys(&config).await?,
        Command::Check => check(&config).await?,
        command => {
            let state = AppState::from_config(config)
                .await
                .context("failed to initialize scrivener")?;
            match run(&state, command).await {
                Ok(value) => value,
                Err(e) => {
                    let body = json!({ "error": e.code(), "message": e.to_string() });
                    println!("{body}");
                    std::process::exit(1);
                }
            }
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("failed to render output")?
    );
    Ok(())
}
