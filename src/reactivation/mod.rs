//! Key reactivation
//!
//! Regaining a usable, locally decrypted copy of keys whose passphrase was
//! lost to a credential reset. Three interchangeable recovery strategies
//! satisfy one contract; a state machine tracks per-key progress; the
//! orchestrator drives a batch through strategy, manifest and server calls,
//! aggregating partial failures instead of aborting.

use async_trait::async_trait;

use crate::{
    error::KeyLifecycleResult,
    provider::CryptoProvider,
    types::{AddressInfo, ArmoredKey, Fingerprint, Key, KeyId, OwnerId, UnlockedKey},
};

pub mod orchestrator;
pub mod password;
pub mod phrase;
pub mod state;
pub mod upload;

pub use orchestrator::{ReactivationOrchestrator, ReactivationReport};
pub use password::PreviousPasswordStrategy;
pub use phrase::RecoveryPhraseStrategy;
pub use state::{ReactivationEntry, ReactivationSet, ReactivationStatus};
pub use upload::{BackupFileStrategy, UploadedKey};

/// A request to reactivate zero or more keys belonging to one owner, built
/// from the difference between the keys the server reports and the keys
/// currently held in decrypted form.
#[derive(Debug, Clone)]
pub struct KeyReactivationRequest {
    pub owner: OwnerId,
    /// Present for address-bound owners; carries the current email the
    /// reactivated key identity must be bound to.
    pub address: Option<AddressInfo>,
    /// The owner's full current key list (the manifest is built over it).
    pub keys: Vec<Key>,
    /// Subset of `keys` needing reactivation.
    pub to_reactivate: Vec<KeyId>,
}

/// Compute reactivation requests for the user's keys and every address:
/// every encrypted, non-forwarding key needs reactivation. Owners with
/// nothing to reactivate are skipped.
pub fn build_reactivation_requests(
    user_keys: &[Key],
    addresses: &[(AddressInfo, Vec<Key>)],
) -> Vec<KeyReactivationRequest> {
    let mut requests = Vec::new();

    let user_targets = locked_key_ids(user_keys);
    if !user_targets.is_empty() {
        requests.push(KeyReactivationRequest {
            owner: OwnerId::User,
            address: None,
            keys: user_keys.to_vec(),
            to_reactivate: user_targets,
        });
    }

    for (address, keys) in addresses {
        let targets = locked_key_ids(keys);
        if !targets.is_empty() {
            requests.push(KeyReactivationRequest {
                owner: OwnerId::Address(address.id.clone()),
                address: Some(address.clone()),
                keys: keys.clone(),
                to_reactivate: targets,
            });
        }
    }

    requests
}

fn locked_key_ids(keys: &[Key]) -> Vec<KeyId> {
    keys.iter()
        .filter(|key| !key.is_decrypted() && !key.material.is_forwarding())
        .map(|key| key.id.clone())
        .collect()
}

/// A successfully recovered key: usable immediately in this session, and
/// re-encrypted under the new account credential for the server to store.
#[derive(Debug, Clone)]
pub struct ReactivatedKey {
    pub unlocked: UnlockedKey,
    pub reencrypted: ArmoredKey,
}

/// Strategy result. `NeedsCredential` replaces the nested decryption
/// prompt of older flows: a still-locked uploaded key is handed back to
/// the caller to resolve and resubmit, the engine never prompts.
#[derive(Debug, Clone)]
pub enum ReactivationOutcome {
    Reactivated(ReactivatedKey),
    NeedsCredential { fingerprint: Fingerprint },
}

/// Per-key context handed to a strategy by the orchestrator.
pub struct StrategyContext<'a> {
    pub owner: &'a OwnerId,
    pub address: Option<&'a AddressInfo>,
    pub entry: &'a ReactivationEntry,
}

impl StrategyContext<'_> {
    pub fn current_email(&self) -> Option<&str> {
        self.address.map(|address| address.email.as_str())
    }
}

/// One recovery path: old locked key plus a credential in, unlocked key
/// plus re-encrypted key out.
#[async_trait]
pub trait ReactivationStrategy: Send + Sync {
    async fn reactivate(
        &self,
        key: &Key,
        ctx: &StrategyContext<'_>,
    ) -> KeyLifecycleResult<ReactivationOutcome>;
}

/// Identity correctness rule: a recovered key whose embedded identity
/// differs from the slot's current address email is re-bound before
/// re-encryption, never silently kept stale.
pub(crate) async fn ensure_current_identity(
    provider: &dyn CryptoProvider,
    unlocked: UnlockedKey,
    current_email: Option<&str>,
) -> KeyLifecycleResult<UnlockedKey> {
    match current_email {
        Some(email) if unlocked.identity.as_deref() != Some(email) => {
            provider.rebind_identity(&unlocked, email).await
        }
        _ => Ok(unlocked),
    }
}
