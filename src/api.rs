//! Server collaborator contract
//!
//! The actual wire formats are owned by the API layer; the engine depends
//! only on these semantics. Every mutating call carries the signed key list
//! computed over the hypothetical post-mutation key set, so server and
//! client state cannot diverge.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::KeyLifecycleResult,
    skl::SignedKeyList,
    types::{ArmoredKey, KeyFlags, KeyId, KeySalt, OwnerId},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySaltEntry {
    pub key_id: KeyId,
    pub salt: KeySalt,
}

#[async_trait]
pub trait KeyApi: Send + Sync {
    /// Fetch the key-derivation salts for an owner's keys.
    async fn get_key_salts(&self, owner: &OwnerId) -> KeyLifecycleResult<Vec<KeySaltEntry>>;

    /// Submit a reactivated key. `manifest` is omitted for keys with no
    /// address binding; pure user keys never require a signed key list.
    async fn reactivate_key(
        &self,
        key_id: &KeyId,
        reencrypted: &ArmoredKey,
        manifest: Option<&SignedKeyList>,
    ) -> KeyLifecycleResult<()>;

    async fn set_key_flags(
        &self,
        key_id: &KeyId,
        flags: KeyFlags,
        manifest: &SignedKeyList,
    ) -> KeyLifecycleResult<()>;

    async fn set_key_primary(
        &self,
        key_id: &KeyId,
        manifest: &SignedKeyList,
    ) -> KeyLifecycleResult<()>;

    async fn delete_key(
        &self,
        key_id: &KeyId,
        manifest: &SignedKeyList,
    ) -> KeyLifecycleResult<()>;

    /// Re-fetch the owner's authoritative key state. Invoked after every
    /// reactivation batch; local incremental state is only a cache.
    async fn refresh_owner(&self, owner: &OwnerId) -> KeyLifecycleResult<()>;
}
