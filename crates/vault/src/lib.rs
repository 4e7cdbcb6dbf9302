//! Signing keys, sealed key envelopes and API credentials for scrivener.
//!
//! This crate provides:
//! - RSA-2048 key generation and PEM encoding
//! - Passphrase-sealed private key storage (PBKDF2 + AES-256-GCM)
//! - Credential issuance and constant-shape verification
//!
//! Nothing here touches a database; persistence lives in the service crate.

pub mod credential;
pub mod envelope;
pub mod error;
pub mod key;
pub mod provider;

pub use credential::IssuedCredential;
pub use error::{VaultError, VaultResult};
pub use key::{KeyPair, PublicKey, SecretKey};
pub use provider::{ActiveKey, KeyProvider};
