//! Reactivation from an uploaded backup file

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::{KeyLifecycleError, KeyLifecycleResult},
    provider::CryptoProvider,
    types::{ArmoredKey, Key, Passphrase, UnlockedKey},
};

use super::{
    ensure_current_identity, ReactivatedKey, ReactivationOutcome, ReactivationStrategy,
    StrategyContext,
};

/// A key parsed out of a user-supplied backup file. Backups exported with
/// a passphrase arrive still locked; the caller resolves those out of band
/// and attaches the unlocked material to the entry.
#[derive(Debug, Clone)]
pub enum UploadedKey {
    Unlocked(UnlockedKey),
    Locked(ArmoredKey),
}

/// Recovers keys by fingerprint match against uploaded backup material.
/// An unlocked key already attached to the entry wins over the candidate
/// pool; a locked candidate match is reported back as `NeedsCredential`
/// rather than prompting here.
pub struct BackupFileStrategy {
    provider: Arc<dyn CryptoProvider>,
    candidates: Vec<UploadedKey>,
    new_passphrase: Passphrase,
}

impl BackupFileStrategy {
    pub fn new(
        provider: Arc<dyn CryptoProvider>,
        candidates: Vec<UploadedKey>,
        new_passphrase: Passphrase,
    ) -> Self {
        Self { provider, candidates, new_passphrase }
    }

    /// Find the candidate matching the target key's fingerprint, if any.
    async fn matching_candidate(
        &self,
        key: &Key,
    ) -> KeyLifecycleResult<Option<&UploadedKey>> {
        for candidate in &self.candidates {
            let fingerprint = match candidate {
                UploadedKey::Unlocked(unlocked) => unlocked.fingerprint.clone(),
                UploadedKey::Locked(armored) => self.provider.inspect(armored).await?.fingerprint,
            };
            if fingerprint == key.fingerprint {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// The identity a recovered key must carry: the slot's current address
    /// email when the owner is an address, otherwise whatever identity the
    /// server-side armored copy already holds.
    async fn desired_identity(
        &self,
        key: &Key,
        ctx: &StrategyContext<'_>,
    ) -> KeyLifecycleResult<Option<String>> {
        if let Some(email) = ctx.current_email() {
            return Ok(Some(email.to_string()));
        }
        match key.material.armored() {
            Some(armored) => Ok(self.provider.inspect(armored).await?.identity),
            None => Ok(None),
        }
    }

    async fn finish(
        &self,
        key: &Key,
        ctx: &StrategyContext<'_>,
        unlocked: UnlockedKey,
    ) -> KeyLifecycleResult<ReactivationOutcome> {
        let identity = self.desired_identity(key, ctx).await?;
        let unlocked =
            ensure_current_identity(self.provider.as_ref(), unlocked, identity.as_deref()).await?;
        let reencrypted = self.provider.encrypt_key(&unlocked, &self.new_passphrase).await?;
        Ok(ReactivationOutcome::Reactivated(ReactivatedKey { unlocked, reencrypted }))
    }
}

#[async_trait]
impl ReactivationStrategy for BackupFileStrategy {
    async fn reactivate(
        &self,
        key: &Key,
        ctx: &StrategyContext<'_>,
    ) -> KeyLifecycleResult<ReactivationOutcome> {
        // Material already resolved and attached to the entry takes
        // priority over another scan of the candidate pool.
        if let Some(uploaded) = &ctx.entry.uploaded {
            if uploaded.fingerprint != key.fingerprint {
                return Err(KeyLifecycleError::KeyIdMismatch {
                    expected: key.fingerprint.to_string(),
                    actual: uploaded.fingerprint.to_string(),
                });
            }
            debug!(key_id = %key.id, "reusing unlocked backup material from entry");
            return self.finish(key, ctx, uploaded.clone()).await;
        }

        match self.matching_candidate(key).await? {
            Some(UploadedKey::Unlocked(unlocked)) => {
                self.finish(key, ctx, unlocked.clone()).await
            }
            Some(UploadedKey::Locked(_)) => {
                debug!(key_id = %key.id, "backup match is still locked");
                Ok(ReactivationOutcome::NeedsCredential { fingerprint: key.fingerprint.clone() })
            }
            None => Err(KeyLifecycleError::NoMatchingKey(key.fingerprint.to_string())),
        }
    }
}
