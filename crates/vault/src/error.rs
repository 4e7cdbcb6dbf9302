//! Vault error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A sealed blob or encoded value is malformed.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// AES-GCM tag verification failed: wrong passphrase or corrupted blob.
    #[error("authentication failure")]
    AuthenticationFailure,

    #[error("key generation error: {0}")]
    KeyGeneration(String),

    #[error("key encoding error: {0}")]
    KeyEncoding(String),

    #[error("signing error: {0}")]
    Signing(String),

    /// Deliberately carries no detail.
    #[error("verification failed")]
    VerificationFailed,
}

/// Result type for vault operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;
