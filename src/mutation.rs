//! Key mutation service
//!
//! Orchestrates flag changes, primary reassignment and deletion. Every
//! operation computes the hypothetical updated key list in memory, builds
//! and signs a manifest over it, submits it to the server, and only on
//! success hands the updated list back. On failure the caller's snapshot is
//! untouched; no partial mutation is ever applied locally.
//!
//! At most one mutation may be in flight per owner's key list; concurrent
//! requests against the same owner are rejected or queued by the caller,
//! not by this service.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    api::KeyApi,
    error::{KeyLifecycleError, KeyLifecycleResult},
    provider::CryptoProvider,
    skl::build_signed_key_list,
    types::{Key, KeyFlags, KeyId},
};

/// Closed set of flag mutations. An unknown action is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagAction {
    MarkObsolete,
    MarkNotObsolete,
    MarkCompromised,
    MarkNotCompromised,
}

impl FlagAction {
    /// Produce the new flags value. Marking compromised clears both
    /// capabilities; clearing the compromised mark restores only the
    /// signing bit, obsolescence is lifted separately.
    pub fn apply(self, flags: KeyFlags) -> KeyFlags {
        match self {
            FlagAction::MarkObsolete => flags.without(KeyFlags::NOT_OBSOLETE),
            FlagAction::MarkNotObsolete => flags.with(KeyFlags::NOT_OBSOLETE),
            FlagAction::MarkCompromised => {
                flags.without(KeyFlags::NOT_OBSOLETE).without(KeyFlags::NOT_COMPROMISED)
            }
            FlagAction::MarkNotCompromised => flags.with(KeyFlags::NOT_COMPROMISED),
        }
    }
}

pub struct KeyMutationService {
    api: Arc<dyn KeyApi>,
    provider: Arc<dyn CryptoProvider>,
}

impl KeyMutationService {
    pub fn new(api: Arc<dyn KeyApi>, provider: Arc<dyn CryptoProvider>) -> Self {
        Self { api, provider }
    }

    /// Apply a flag action to the target key.
    pub async fn set_flags(
        &self,
        keys: Vec<Key>,
        target: &KeyId,
        action: FlagAction,
    ) -> KeyLifecycleResult<Vec<Key>> {
        let index = find_key(&keys, target)?;

        let mut updated = keys;
        let new_flags = action.apply(updated[index].effective_flags());
        updated[index].flags = Some(new_flags);

        let manifest = build_signed_key_list(&updated, self.provider.as_ref()).await?;
        if let Err(err) = self.api.set_key_flags(target, new_flags, &manifest).await {
            warn!(key_id = %target, %err, "flag change rejected");
            return Err(err);
        }

        info!(key_id = %target, flags = new_flags.bits(), "key flags updated");
        Ok(updated)
    }

    /// Designate the target as the owner's primary key within its version
    /// class, demoting any other primary of that class and moving the new
    /// primary to the front of the canonical order.
    pub async fn set_primary(
        &self,
        keys: Vec<Key>,
        target: &KeyId,
    ) -> KeyLifecycleResult<Vec<Key>> {
        let index = find_key(&keys, target)?;

        let mut updated = keys;
        let target_is_v6 = updated[index].is_v6();
        for key in updated.iter_mut() {
            if key.is_v6() == target_is_v6 {
                key.primary = &key.id == target;
            }
        }
        let promoted = updated.remove(index);
        updated.insert(0, promoted);

        let manifest = build_signed_key_list(&updated, self.provider.as_ref()).await?;
        if let Err(err) = self.api.set_key_primary(target, &manifest).await {
            warn!(key_id = %target, %err, "primary change rejected");
            return Err(err);
        }

        info!(key_id = %target, "primary key updated");
        Ok(updated)
    }

    /// Delete the target key. The manifest is built over the remaining
    /// keys; deleting the last usable primary fails fast with
    /// `NoUsablePrimaryKey` before any network call.
    pub async fn delete(&self, keys: Vec<Key>, target: &KeyId) -> KeyLifecycleResult<Vec<Key>> {
        let index = find_key(&keys, target)?;

        let mut updated = keys;
        updated.remove(index);

        let manifest = build_signed_key_list(&updated, self.provider.as_ref()).await?;
        if let Err(err) = self.api.delete_key(target, &manifest).await {
            warn!(key_id = %target, %err, "key deletion rejected");
            return Err(err);
        }

        info!(key_id = %target, "key deleted");
        Ok(updated)
    }
}

fn find_key(keys: &[Key], target: &KeyId) -> KeyLifecycleResult<usize> {
    keys.iter()
        .position(|key| &key.id == target)
        .ok_or_else(|| KeyLifecycleError::KeyNotFound(target.to_string()))
}
