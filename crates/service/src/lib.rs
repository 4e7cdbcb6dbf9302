//! File lifecycle orchestration for scrivener.
//!
//! This crate drives the registry and the object store together:
//! - Upload and delete sagas with compensation
//! - Rename and listing
//! - Reconciliation of records left in doubt
//! - Key vault persistence and the credential issuer
//! - Transcript request publishing

pub mod auth;
pub mod error;
pub mod files;
pub mod keys;
pub mod publisher;
pub mod state;
pub mod sync;
pub mod transcript;

pub use auth::CredentialIssuer;
pub use error::{ServiceError, ServiceResult};
pub use files::FileService;
pub use keys::KeyVault;
pub use publisher::{DisabledPublisher, SpoolPublisher, TranscriptPublisher};
pub use state::AppState;
pub use sync::{Reconciler, SyncOutcome, SyncPlan};
pub use transcript::TranscriptService;
