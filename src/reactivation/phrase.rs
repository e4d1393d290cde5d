//! Reactivation by recovery phrase

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::{KeyLifecycleError, KeyLifecycleResult},
    provider::CryptoProvider,
    types::{Key, MasterSecret, Passphrase},
};

use super::{
    ensure_current_identity, ReactivatedKey, ReactivationOutcome, ReactivationStrategy,
    StrategyContext,
};

/// Recovers keys with the master secret derived from a recovery mnemonic.
/// Only keys that were associated with the secret when the phrase was set
/// up can be unlocked; others fail with `NoAssociation`.
pub struct RecoveryPhraseStrategy {
    provider: Arc<dyn CryptoProvider>,
    secret: MasterSecret,
    new_passphrase: Passphrase,
}

impl RecoveryPhraseStrategy {
    pub fn new(
        provider: Arc<dyn CryptoProvider>,
        secret: MasterSecret,
        new_passphrase: Passphrase,
    ) -> Self {
        Self { provider, secret, new_passphrase }
    }

    /// Derive the master secret from the mnemonic phrase first.
    pub async fn from_phrase(
        provider: Arc<dyn CryptoProvider>,
        phrase: &str,
        new_passphrase: Passphrase,
    ) -> KeyLifecycleResult<Self> {
        let secret = provider.derive_from_mnemonic(phrase).await?;
        Ok(Self::new(provider, secret, new_passphrase))
    }
}

#[async_trait]
impl ReactivationStrategy for RecoveryPhraseStrategy {
    async fn reactivate(
        &self,
        key: &Key,
        ctx: &StrategyContext<'_>,
    ) -> KeyLifecycleResult<ReactivationOutcome> {
        let armored = key
            .material
            .armored()
            .ok_or_else(|| KeyLifecycleError::AlreadyDecrypted(key.id.to_string()))?;

        let unlocked = self.provider.unlock_with_secret(armored, &self.secret).await?;
        debug!(key_id = %key.id, "key unlocked with recovery secret");

        let unlocked =
            ensure_current_identity(self.provider.as_ref(), unlocked, ctx.current_email()).await?;
        let reencrypted = self.provider.encrypt_key(&unlocked, &self.new_passphrase).await?;

        Ok(ReactivationOutcome::Reactivated(ReactivatedKey { unlocked, reencrypted }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCryptoProvider;
    use crate::reactivation::{KeyReactivationRequest, ReactivationSet};
    use crate::types::{MaterialState, OwnerId};

    fn key_with_recovery(fingerprint: &str, secrets: &[MasterSecret]) -> Key {
        let armored = MockCryptoProvider::armored_key_with_recovery(
            fingerprint,
            4,
            None,
            &Passphrase::new("lost"),
            secrets,
        );
        Key {
            id: fingerprint.into(),
            fingerprint: fingerprint.into(),
            version: 4,
            flags: None,
            primary: false,
            ownership: OwnerId::User,
            material: MaterialState::Encrypted(armored),
        }
    }

    fn context(key: &Key) -> (ReactivationSet, KeyReactivationRequest) {
        let request = KeyReactivationRequest {
            owner: OwnerId::User,
            address: None,
            keys: vec![key.clone()],
            to_reactivate: vec![key.id.clone()],
        };
        (ReactivationSet::initialize(std::slice::from_ref(&request)), request)
    }

    #[tokio::test]
    async fn test_associated_key_reactivates() {
        let provider = Arc::new(MockCryptoProvider::new());
        let secret = provider.derive_from_mnemonic("release umbrella fatigue").await.unwrap();
        let key = key_with_recovery("fp1", std::slice::from_ref(&secret));
        let (state, request) = context(&key);

        let strategy = RecoveryPhraseStrategy::from_phrase(
            provider.clone(),
            "release umbrella fatigue",
            Passphrase::new("newpw"),
        )
        .await
        .unwrap();

        let ctx = StrategyContext {
            owner: &request.owner,
            address: None,
            entry: state.entry(&key.id).unwrap(),
        };
        let ReactivationOutcome::Reactivated(reactivated) =
            strategy.reactivate(&key, &ctx).await.unwrap()
        else {
            panic!("expected a reactivated key");
        };
        let reopened = provider
            .decrypt_key(&reactivated.reencrypted, &Passphrase::new("newpw"))
            .await
            .unwrap();
        assert_eq!(reopened.fingerprint.as_str(), "fp1");
    }

    #[tokio::test]
    async fn test_unassociated_key_fails_with_no_association() {
        let provider = Arc::new(MockCryptoProvider::new());
        let other = provider.derive_from_mnemonic("different words here").await.unwrap();
        let key = key_with_recovery("fp1", std::slice::from_ref(&other));
        let (state, request) = context(&key);

        let strategy = RecoveryPhraseStrategy::from_phrase(
            provider,
            "release umbrella fatigue",
            Passphrase::new("newpw"),
        )
        .await
        .unwrap();

        let ctx = StrategyContext {
            owner: &request.owner,
            address: None,
            entry: state.entry(&key.id).unwrap(),
        };
        let err = strategy.reactivate(&key, &ctx).await.unwrap_err();
        assert!(matches!(err, KeyLifecycleError::NoAssociation));
    }

    #[tokio::test]
    async fn test_decrypted_key_rejected() {
        let provider = Arc::new(MockCryptoProvider::new());
        let secret = provider.derive_from_mnemonic("release umbrella fatigue").await.unwrap();
        let mut key = key_with_recovery("fp1", std::slice::from_ref(&secret));
        key.material = MaterialState::Decrypted(MockCryptoProvider::unlocked_key("fp1", 4, None));
        let (state, request) = context(&key);

        let strategy =
            RecoveryPhraseStrategy::new(provider, secret, Passphrase::new("newpw"));
        let ctx = StrategyContext {
            owner: &request.owner,
            address: None,
            entry: state.entry(&key.id).unwrap(),
        };
        let err = strategy.reactivate(&key, &ctx).await.unwrap_err();
        assert!(matches!(err, KeyLifecycleError::AlreadyDecrypted(_)));
    }
}
