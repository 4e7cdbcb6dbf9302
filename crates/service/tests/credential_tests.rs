//! Signing key lifecycle and credential issuance against a real registry.

mod common;

use common::*;
use scrivener_core::DEFAULT_KEY_PURPOSE;
use scrivener_core::config::Secret;
use scrivener_metadata::MetadataError;
use scrivener_service::{CredentialIssuer, KeyVault, ServiceError};
use scrivener_vault::{ActiveKey, KeyPair, VaultError};
use std::sync::Arc;

fn vault(metadata: &TestMetadata, passphrase: &str) -> KeyVault {
    KeyVault::new(metadata.store(), Secret::new(passphrase), DEFAULT_KEY_PURPOSE)
}

async fn issuer(metadata: &TestMetadata) -> CredentialIssuer {
    let keys = vault(metadata, "correct horse");
    keys.ensure_initialized().await.unwrap();
    CredentialIssuer::new(metadata.store(), keys.load_active().await.unwrap())
}

#[tokio::test]
async fn test_key_initialized_once() {
    run_metadata_test_both(|store| async move {
        let keys = KeyVault::new(store.clone(), Secret::new("pass"), DEFAULT_KEY_PURPOSE);

        assert!(keys.ensure_initialized().await.unwrap());
        for _ in 0..3 {
            assert!(!keys.ensure_initialized().await.unwrap());
        }
        assert_eq!(store.count_signing_keys(DEFAULT_KEY_PURPOSE).await.unwrap(), 1);
    })
    .await;
}

#[tokio::test]
async fn test_loaded_key_matches_stored_public_key() {
    let metadata = TestMetadata::new().await.unwrap();
    let keys = vault(&metadata, "pass");
    keys.ensure_initialized().await.unwrap();

    let provider = keys.load_active().await.unwrap();
    let row = metadata
        .store
        .get_active_signing_key(DEFAULT_KEY_PURPOSE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(provider.public_key().to_pem().unwrap(), row.public_key);
    assert_eq!(provider.purpose(), DEFAULT_KEY_PURPOSE);

    // Sealed at rest: the stored blob is not PEM text.
    assert!(!String::from_utf8_lossy(&row.private_key).contains("PRIVATE KEY"));
}

#[tokio::test]
async fn test_wrong_passphrase_fails_to_load() {
    let metadata = TestMetadata::new().await.unwrap();
    vault(&metadata, "right").ensure_initialized().await.unwrap();

    let err = vault(&metadata, "wrong").load_active().await.err().unwrap();
    assert!(matches!(err, ServiceError::Vault(VaultError::AuthenticationFailure)));
    assert_eq!(err.code(), "authentication_failure");
}

#[tokio::test]
async fn test_load_before_initialization() {
    let metadata = TestMetadata::new().await.unwrap();

    let err = vault(&metadata, "pass").load_active().await.err().unwrap();
    assert!(matches!(err, ServiceError::Metadata(MetadataError::NoRecordFound(_))));
}

#[tokio::test]
async fn test_purposes_are_independent() {
    let metadata = TestMetadata::new().await.unwrap();
    let a = KeyVault::new(metadata.store(), Secret::new("pass"), "credentials");
    let b = KeyVault::new(metadata.store(), Secret::new("pass"), "webhooks");

    assert!(a.ensure_initialized().await.unwrap());
    assert!(b.ensure_initialized().await.unwrap());
    assert_ne!(
        a.load_active().await.unwrap().public_key(),
        b.load_active().await.unwrap().public_key()
    );
}

#[tokio::test]
async fn test_register_and_authenticate() {
    let metadata = TestMetadata::new().await.unwrap();
    let issuer = issuer(&metadata).await;

    let (user, credential) = issuer.register("ada@example.com").await.unwrap();
    assert_eq!(issuer.authenticate(&credential).await.unwrap(), user.user_id);
    assert_eq!(
        issuer
            .authenticate(&format!("ApiKey {credential}"))
            .await
            .unwrap(),
        user.user_id
    );
}

#[tokio::test]
async fn test_register_rejects_bad_email() {
    let metadata = TestMetadata::new().await.unwrap();
    let issuer = issuer(&metadata).await;

    for email in ["", "   ", "no-at-sign"] {
        let err = issuer.register(email).await.unwrap_err();
        assert_eq!(err.code(), "invalid_input", "{email:?}");
    }

    issuer.register("ada@example.com").await.unwrap();
    let err = issuer.register("ada@example.com").await.unwrap_err();
    assert_eq!(err.code(), "duplicate_data");
}

#[tokio::test]
async fn test_each_issue_is_distinct() {
    let metadata = TestMetadata::new().await.unwrap();
    let issuer = issuer(&metadata).await;
    let (user, first) = issuer.register("ada@example.com").await.unwrap();

    let second = issuer.issue(user.user_id).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(issuer.authenticate(&second).await.unwrap(), user.user_id);

    let err = issuer.issue(uuid::Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.code(), "no_record_found");
}

#[tokio::test]
async fn test_unknown_and_malformed_are_unauthorized() {
    let metadata = TestMetadata::new().await.unwrap();
    let issuer = issuer(&metadata).await;
    issuer.register("ada@example.com").await.unwrap();

    for presented in [
        "",
        "ApiKey ",
        "not base64 at all!",
        "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=",
    ] {
        let err = issuer.authenticate(presented).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized), "{presented:?}");
    }
}

#[tokio::test]
async fn test_revoked_credential_is_rejected() {
    let metadata = TestMetadata::new().await.unwrap();
    let issuer = issuer(&metadata).await;
    let (_, credential) = issuer.register("ada@example.com").await.unwrap();

    issuer.revoke(&credential).await.unwrap();
    assert!(matches!(
        issuer.authenticate(&credential).await.unwrap_err(),
        ServiceError::Unauthorized
    ));

    let err = issuer.revoke(&credential).await.unwrap_err();
    assert_eq!(err.code(), "no_record_found");

    let err = issuer.revoke("%%%").await.unwrap_err();
    assert_eq!(err.code(), "invalid_input");
}

#[tokio::test]
async fn test_tampered_signature_is_rejected() {
    let metadata = TestMetadata::new().await.unwrap();
    let issuer = issuer(&metadata).await;
    let (_, credential) = issuer.register("ada@example.com").await.unwrap();

    sqlx::query("UPDATE api_credentials SET signature = ?")
        .bind(vec![0u8; 256])
        .execute(metadata.pool())
        .await
        .unwrap();

    assert!(matches!(
        issuer.authenticate(&credential).await.unwrap_err(),
        ServiceError::Unauthorized
    ));
}

#[tokio::test]
async fn test_credentials_from_another_key_are_rejected() {
    let metadata = TestMetadata::new().await.unwrap();
    let issuer = issuer(&metadata).await;
    let (_, credential) = issuer.register("ada@example.com").await.unwrap();

    // Same registry, different signing key.
    let foreign = Arc::new(ActiveKey::new(
        DEFAULT_KEY_PURPOSE,
        KeyPair::generate().unwrap(),
    ));
    let impostor = CredentialIssuer::new(metadata.store(), foreign);

    assert!(matches!(
        impostor.authenticate(&credential).await.unwrap_err(),
        ServiceError::Unauthorized
    ));
}
