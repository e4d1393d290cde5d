//! Reactivation by previous password

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    api::KeyApi,
    error::{KeyLifecycleError, KeyLifecycleResult},
    provider::CryptoProvider,
    types::{Key, Passphrase},
};

use super::{
    ensure_current_identity, ReactivatedKey, ReactivationOutcome, ReactivationStrategy,
    StrategyContext,
};

/// Recovers a key with the account password in use before the credential
/// reset: the owner's key-derivation salt for the target key is fetched,
/// the old decryption passphrase re-derived, and the stored armored key
/// decrypted and re-encrypted under the new account passphrase.
pub struct PreviousPasswordStrategy {
    api: Arc<dyn KeyApi>,
    provider: Arc<dyn CryptoProvider>,
    old_password: String,
    new_passphrase: Passphrase,
}

impl PreviousPasswordStrategy {
    pub fn new(
        api: Arc<dyn KeyApi>,
        provider: Arc<dyn CryptoProvider>,
        old_password: impl Into<String>,
        new_passphrase: Passphrase,
    ) -> Self {
        Self { api, provider, old_password: old_password.into(), new_passphrase }
    }
}

#[async_trait]
impl ReactivationStrategy for PreviousPasswordStrategy {
    async fn reactivate(
        &self,
        key: &Key,
        ctx: &StrategyContext<'_>,
    ) -> KeyLifecycleResult<ReactivationOutcome> {
        let armored = key
            .material
            .armored()
            .ok_or_else(|| KeyLifecycleError::AlreadyDecrypted(key.id.to_string()))?;

        let salts = self.api.get_key_salts(ctx.owner).await?;
        let salt = salts
            .iter()
            .find(|entry| entry.key_id == key.id)
            .map(|entry| &entry.salt)
            .ok_or_else(|| KeyLifecycleError::KeyNotFound(key.id.to_string()))?;

        let old_passphrase = self.provider.derive_key_password(&self.old_password, salt).await?;
        let unlocked = self.provider.decrypt_key(armored, &old_passphrase).await?;
        debug!(key_id = %key.id, "key decrypted with previous password");

        let unlocked =
            ensure_current_identity(self.provider.as_ref(), unlocked, ctx.current_email()).await?;
        let reencrypted = self.provider.encrypt_key(&unlocked, &self.new_passphrase).await?;

        Ok(ReactivationOutcome::Reactivated(ReactivatedKey { unlocked, reencrypted }))
    }
}
