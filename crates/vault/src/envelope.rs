//! Passphrase-sealed envelopes for private key material.
//!
//! Layout: `salt(16) || nonce(12) || ciphertext`. The AES-256-GCM key is
//! derived from the passphrase with PBKDF2-HMAC-SHA256.

use crate::error::{VaultError, VaultResult};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroizing;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const PBKDF2_ITERATIONS: u32 = 100_000;
const KEY_LEN: usize = 32;

fn derive_key(passphrase: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase, salt, PBKDF2_ITERATIONS, &mut *key);
    key
}

fn cipher(passphrase: &[u8], salt: &[u8]) -> VaultResult<Aes256Gcm> {
    let key = derive_key(passphrase, salt);
    Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| VaultError::KeyEncoding(format!("invalid AES key: {e}")))
}

/// Encrypt `plaintext` under `passphrase` with a fresh salt and nonce.
pub fn seal(passphrase: &[u8], plaintext: &[u8]) -> VaultResult<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher(passphrase, &salt)?
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| VaultError::KeyEncoding("AES-GCM encryption failed".to_string()))?;

    let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a blob produced by [`seal`].
pub fn open(passphrase: &[u8], blob: &[u8]) -> VaultResult<Zeroizing<Vec<u8>>> {
    if blob.len() < SALT_LEN + NONCE_LEN {
        return Err(VaultError::InvalidFormat(format!(
            "sealed blob too short: {} bytes",
            blob.len()
        )));
    }
    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    cipher(passphrase, salt)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| VaultError::AuthenticationFailure)
}
