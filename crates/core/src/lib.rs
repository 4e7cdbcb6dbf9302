//! Core domain types and shared logic for scrivener.
//!
//! This crate defines the data model used across all other crates:
//! - File record lock and upload states
//! - Object key naming inside a user's namespace
//! - Optimistic-concurrency version tokens
//! - Transcript request payloads
//! - Application configuration

pub mod config;
pub mod error;
pub mod file;
pub mod transcript;
pub mod version;

pub use error::{Error, Result};
pub use file::{AMBIGUOUS_STATES, FileState, LockStatus, UploadStatus};
pub use transcript::TranscriptRequest;

/// Default maximum upload size: 50 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Default signing key purpose.
pub const DEFAULT_KEY_PURPOSE: &str = "jwt";
