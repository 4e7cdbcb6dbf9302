//! Opaque API credentials.
//!
//! A credential is 32 random bytes handed to the client as standard base64.
//! The server keeps the raw bytes and an RSA signature over their SHA-256.

use crate::error::{VaultError, VaultResult};
use crate::key::PublicKey;
use crate::provider::KeyProvider;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;

pub const CREDENTIAL_LEN: usize = 32;

/// Scheme prefix clients put in front of the encoded credential.
pub const CREDENTIAL_SCHEME: &str = "ApiKey ";

/// A freshly minted credential and its signature.
pub struct IssuedCredential {
    pub bytes: Vec<u8>,
    pub signature: Vec<u8>,
}

impl IssuedCredential {
    /// Transport form returned to the client.
    pub fn encoded(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("bytes", &"[REDACTED]")
            .field("signature_len", &self.signature.len())
            .finish()
    }
}

/// Draw a new credential and sign it with the provider's key.
pub fn issue(provider: &dyn KeyProvider) -> VaultResult<IssuedCredential> {
    let mut bytes = vec![0u8; CREDENTIAL_LEN];
    OsRng.fill_bytes(&mut bytes);
    let signature = provider.sign(&bytes)?;
    Ok(IssuedCredential { bytes, signature })
}

/// Decode the transport form, tolerating a leading `ApiKey ` scheme.
pub fn decode(credential: &str) -> VaultResult<Vec<u8>> {
    STANDARD
        .decode(strip_scheme(credential).trim())
        .map_err(|_| VaultError::InvalidFormat("credential is not valid base64".to_string()))
}

pub fn strip_scheme(credential: &str) -> &str {
    credential
        .strip_prefix(CREDENTIAL_SCHEME)
        .unwrap_or(credential)
}

/// Check a stored signature against raw credential bytes.
///
/// Every failure, including malformed input, is `VerificationFailed`.
pub fn verify(credential: &[u8], signature: &[u8], public_key: &PublicKey) -> VaultResult<()> {
    if credential.len() != CREDENTIAL_LEN {
        return Err(VaultError::VerificationFailed);
    }
    public_key.verify(credential, signature)
}

/// [`verify`] for the transport form.
pub fn verify_encoded(credential: &str, signature: &[u8], public_key: &PublicKey) -> VaultResult<()> {
    let bytes = decode(credential).map_err(|_| VaultError::VerificationFailed)?;
    verify(&bytes, signature, public_key)
}
