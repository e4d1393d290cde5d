//! Integration tests for the key lifecycle engine
//!
//! Exercises the public API end to end against the shipped software mocks:
//! request building, each reactivation strategy through the orchestrator,
//! manifest semantics, and mutation rollback.

use std::sync::Arc;

use key_lifecycle::mock::{ApiCall, MockCryptoProvider, MockKeyApi};
use key_lifecycle::{
    build_reactivation_requests, CryptoProvider, build_signed_key_list, AddressInfo, AddressStatus,
    BackupFileStrategy, FlagAction, Key, KeyFlags, KeyId, KeyMutationService, KeySalt,
    MaterialState, OwnerId, Passphrase, PreviousPasswordStrategy, ReactivationFailure,
    ReactivationOrchestrator, ReactivationSet, ReactivationStatus, RecoveryPhraseStrategy,
    UploadedKey,
};

fn address() -> AddressInfo {
    AddressInfo {
        id: "addr-1".into(),
        email: "alice@example.com".to_string(),
        status: AddressStatus::Enabled,
    }
}

fn decrypted_key(id: &str, primary: bool) -> Key {
    Key {
        id: id.into(),
        fingerprint: id.into(),
        version: 4,
        flags: Some(KeyFlags::ALL),
        primary,
        ownership: OwnerId::Address("addr-1".into()),
        material: MaterialState::Decrypted(MockCryptoProvider::unlocked_key(
            id,
            4,
            Some("alice@example.com"),
        )),
    }
}

async fn locked_key(
    provider: &MockCryptoProvider,
    api: &MockKeyApi,
    id: &str,
    salt: &str,
    password: &str,
) -> Key {
    api.insert_salt(id.into(), KeySalt(salt.to_string())).await;
    let passphrase = provider
        .derive_key_password(password, &KeySalt(salt.to_string()))
        .await
        .expect("derive passphrase");
    Key {
        id: id.into(),
        fingerprint: id.into(),
        version: 4,
        flags: Some(KeyFlags::ALL),
        primary: false,
        ownership: OwnerId::Address("addr-1".into()),
        material: MaterialState::Encrypted(MockCryptoProvider::armored_key(
            id,
            4,
            Some("alice@example.com"),
            &passphrase,
        )),
    }
}

#[tokio::test]
async fn test_old_password_reactivation_end_to_end() {
    let api = Arc::new(MockKeyApi::new());
    let provider = Arc::new(MockCryptoProvider::new());

    let primary = decrypted_key("k-primary", true);
    let locked = locked_key(&provider, &api, "k-locked", "salt-1", "old-password").await;
    let address_keys = vec![primary, locked];

    let requests = build_reactivation_requests(&[], &[(address(), address_keys)]);
    assert_eq!(requests.len(), 1, "one owner has locked keys");
    assert_eq!(requests[0].to_reactivate, vec!["k-locked".into()]);

    let mut state = ReactivationSet::initialize(&requests);
    let strategy = PreviousPasswordStrategy::new(
        api.clone(),
        provider.clone(),
        "old-password",
        Passphrase::new("new-password"),
    );
    let orchestrator = ReactivationOrchestrator::new(api.clone(), provider.clone());

    let report = orchestrator
        .run(&requests, &strategy, &mut state)
        .await
        .expect("batch run");
    assert_eq!(report.reactivated, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(
        state.entry(&"k-locked".into()).expect("entry").status,
        ReactivationStatus::Success
    );

    // Address keys are always submitted with a manifest, and the owner is
    // refreshed afterwards.
    let calls = api.calls().await;
    assert!(calls.contains(&ApiCall::ReactivateKey {
        key_id: "k-locked".into(),
        with_manifest: true,
    }));
    assert!(calls.contains(&ApiCall::RefreshOwner(OwnerId::Address("addr-1".into()))));
}

#[tokio::test]
async fn test_upload_mismatch_never_reaches_the_server() {
    let api = Arc::new(MockKeyApi::new());
    let provider = Arc::new(MockCryptoProvider::new());

    let primary = decrypted_key("k-primary", true);
    let locked = locked_key(&provider, &api, "k-locked", "salt-1", "old-password").await;

    let requests = build_reactivation_requests(&[], &[(address(), vec![primary, locked])]);
    let mut state = ReactivationSet::initialize(&requests);

    // The uploaded backup holds an unrelated key.
    let candidates = vec![UploadedKey::Unlocked(MockCryptoProvider::unlocked_key(
        "unrelated",
        4,
        None,
    ))];
    let strategy =
        BackupFileStrategy::new(provider.clone(), candidates, Passphrase::new("new-password"));
    let orchestrator = ReactivationOrchestrator::new(api.clone(), provider);

    let report = orchestrator
        .run(&requests, &strategy, &mut state)
        .await
        .expect("batch run");
    assert_eq!(report.failed, 1);
    assert_eq!(
        state.entry(&"k-locked".into()).expect("entry").status,
        ReactivationStatus::Error(ReactivationFailure::NoMatchingKey)
    );
    assert!(!api
        .calls()
        .await
        .iter()
        .any(|call| matches!(call, ApiCall::ReactivateKey { .. })));
}

#[tokio::test]
async fn test_batch_isolation_with_mixed_outcomes() {
    let api = Arc::new(MockKeyApi::new());
    let provider = Arc::new(MockCryptoProvider::new());

    let primary = decrypted_key("k-primary", true);
    let good = locked_key(&provider, &api, "k-good", "salt-1", "old-password").await;
    // Locked under a password the strategy does not know.
    let bad = locked_key(&provider, &api, "k-bad", "salt-2", "unrelated-password").await;

    let requests = build_reactivation_requests(&[], &[(address(), vec![primary, good, bad])]);
    let mut state = ReactivationSet::initialize(&requests);
    let strategy = PreviousPasswordStrategy::new(
        api.clone(),
        provider.clone(),
        "old-password",
        Passphrase::new("new-password"),
    );
    let orchestrator = ReactivationOrchestrator::new(api.clone(), provider.clone());

    let report = orchestrator
        .run(&requests, &strategy, &mut state)
        .await
        .expect("batch run");
    assert_eq!(report.reactivated, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(
        state.entry(&"k-good".into()).expect("entry").status,
        ReactivationStatus::Success
    );
    assert_eq!(
        state.entry(&"k-bad".into()).expect("entry").status,
        ReactivationStatus::Error(ReactivationFailure::IncorrectPassword)
    );

    // One failure does not suppress the final refresh.
    assert!(api
        .calls()
        .await
        .contains(&ApiCall::RefreshOwner(OwnerId::Address("addr-1".into()))));
}

#[tokio::test]
async fn test_recovery_phrase_reactivation() {
    let api = Arc::new(MockKeyApi::new());
    let provider = Arc::new(MockCryptoProvider::new());

    let secret = provider
        .derive_from_mnemonic("vault harbor planet")
        .await
        .expect("derive secret");
    let associated = MockCryptoProvider::armored_key_with_recovery(
        "k-locked",
        4,
        Some("alice@example.com"),
        &Passphrase::new("lost"),
        std::slice::from_ref(&secret),
    );
    let mut locked = decrypted_key("k-locked", false);
    locked.material = MaterialState::Encrypted(associated);
    let primary = decrypted_key("k-primary", true);

    let requests = build_reactivation_requests(&[], &[(address(), vec![primary, locked])]);
    let mut state = ReactivationSet::initialize(&requests);
    let strategy = RecoveryPhraseStrategy::from_phrase(
        provider.clone(),
        "vault harbor planet",
        Passphrase::new("new-password"),
    )
    .await
    .expect("strategy from phrase");
    let orchestrator = ReactivationOrchestrator::new(api.clone(), provider.clone());

    let report = orchestrator
        .run(&requests, &strategy, &mut state)
        .await
        .expect("batch run");
    assert_eq!(report.reactivated, 1);

    // A phrase with no association against the same key fails cleanly.
    let mut locked_again = decrypted_key("k-other", false);
    locked_again.material = MaterialState::Encrypted(MockCryptoProvider::armored_key(
        "k-other",
        4,
        None,
        &Passphrase::new("lost"),
    ));
    let requests =
        build_reactivation_requests(&[], &[(address(), vec![decrypted_key("k-primary", true), locked_again])]);
    let mut state = ReactivationSet::initialize(&requests);
    let report = orchestrator
        .run(&requests, &strategy, &mut state)
        .await
        .expect("batch run");
    assert_eq!(report.failed, 1);
    assert_eq!(
        state.entry(&"k-other".into()).expect("entry").status,
        ReactivationStatus::Error(ReactivationFailure::NoAssociation)
    );
}

#[tokio::test]
async fn test_flag_mutation_rolls_back_on_server_rejection() {
    let api = Arc::new(MockKeyApi::new());
    let provider = Arc::new(MockCryptoProvider::new());
    let service = KeyMutationService::new(api.clone(), provider.clone());

    let keys = vec![decrypted_key("k-primary", true), decrypted_key("k-extra", false)];

    // Accepted: the returned list carries the new flags and the manifest
    // over the hypothetical list was submitted with the call.
    let updated = service
        .set_flags(keys.clone(), &"k-extra".into(), FlagAction::MarkObsolete)
        .await
        .expect("flag change");
    let extra = updated.iter().find(|key| key.id == KeyId::from("k-extra")).expect("key");
    assert!(!extra.effective_flags().can_encrypt());
    assert!(extra.effective_flags().can_sign());

    // Rejected: the error propagates and the caller's snapshot still holds
    // the old flags.
    api.fail_on("set_key_flags").await;
    let err = service
        .set_flags(keys.clone(), &"k-extra".into(), FlagAction::MarkCompromised)
        .await
        .expect_err("server rejection");
    assert!(err.to_string().contains("set_key_flags"));
    let original = keys.iter().find(|key| key.id == KeyId::from("k-extra")).expect("key");
    assert_eq!(original.effective_flags(), KeyFlags::ALL);
}

#[tokio::test]
async fn test_manifest_reflects_reactivated_flags_unchanged() {
    let api = Arc::new(MockKeyApi::new());
    let provider = Arc::new(MockCryptoProvider::new());

    let primary = decrypted_key("k-primary", true);
    let mut locked = locked_key(&provider, &api, "k-locked", "salt-1", "old-password").await;
    locked.flags = Some(KeyFlags::new(KeyFlags::NOT_COMPROMISED));

    let manifest_before = build_signed_key_list(
        &[primary.clone(), locked.clone()],
        provider.as_ref(),
    )
    .await
    .expect("manifest");

    // Reactivation changes only the material; flags and order in the
    // manifest stay as they were.
    let requests =
        build_reactivation_requests(&[], &[(address(), vec![primary.clone(), locked.clone()])]);
    let mut state = ReactivationSet::initialize(&requests);
    let strategy = PreviousPasswordStrategy::new(
        api.clone(),
        provider.clone(),
        "old-password",
        Passphrase::new("new-password"),
    );
    let orchestrator = ReactivationOrchestrator::new(api.clone(), provider.clone());
    orchestrator
        .run(&requests, &strategy, &mut state)
        .await
        .expect("batch run");

    let mut reactivated = locked;
    reactivated.material = MaterialState::Decrypted(MockCryptoProvider::unlocked_key(
        "k-locked",
        4,
        Some("alice@example.com"),
    ));
    let manifest_after = build_signed_key_list(&[primary, reactivated], provider.as_ref())
        .await
        .expect("manifest");
    assert_eq!(manifest_before.data, manifest_after.data);
}
