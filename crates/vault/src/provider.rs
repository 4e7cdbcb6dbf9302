//! Access to the active signing key.

use crate::error::VaultResult;
use crate::key::{KeyPair, PublicKey};

/// Source of the signing key used for credentials.
///
/// Passed explicitly to whatever issues or checks credentials, so tests can
/// substitute a fixed key.
pub trait KeyProvider: Send + Sync {
    /// Purpose the key is registered under (e.g. "jwt").
    fn purpose(&self) -> &str;

    fn public_key(&self) -> &PublicKey;

    /// Sign SHA-256 of `message`.
    fn sign(&self, message: &[u8]) -> VaultResult<Vec<u8>>;
}

/// A decrypted key pair loaded for one purpose.
#[derive(Debug)]
pub struct ActiveKey {
    purpose: String,
    keypair: KeyPair,
}

impl ActiveKey {
    pub fn new(purpose: impl Into<String>, keypair: KeyPair) -> Self {
        Self {
            purpose: purpose.into(),
            keypair,
        }
    }
}

impl KeyProvider for ActiveKey {
    fn purpose(&self) -> &str {
        &self.purpose
    }

    fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }

    fn sign(&self, message: &[u8]) -> VaultResult<Vec<u8>> {
        self.keypair.secret.sign(message)
    }
}
