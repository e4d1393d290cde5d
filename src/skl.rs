//! Signed key list builder
//!
//! Produces the manifest the server trusts: an ordered serialization of
//! `{id, fingerprint, flags, primary}` for every key of one owner, plus a
//! detached signature over its content digest made with the owner's current
//! decrypted primary key. Rebuilt and re-signed after every key, flag or
//! primary mutation.

use ring::digest;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{KeyLifecycleError, KeyLifecycleResult},
    provider::CryptoProvider,
    types::{Fingerprint, Key, KeyId, UnlockedKey},
};

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedKeyListItem {
    pub id: KeyId,
    pub fingerprint: Fingerprint,
    /// Effective flag bits; legacy keys without flags render as both set.
    pub flags: u8,
    pub primary: u8,
}

/// The manifest plus its detached signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedKeyList {
    pub data: String,
    pub signature: String,
}

impl SignedKeyList {
    /// Hex SHA-256 digest of the serialized manifest data.
    pub fn digest(&self) -> String {
        hex::encode(digest::digest(&digest::SHA256, self.data.as_bytes()))
    }
}

/// Canonical manifest order: primary first, otherwise stable in input order.
pub fn canonical_order(keys: &[Key]) -> Vec<&Key> {
    let mut ordered: Vec<&Key> = keys.iter().collect();
    ordered.sort_by_key(|key| !key.primary);
    ordered
}

/// Locate the owner's current decrypted primary key, required to sign the
/// manifest. Mutating or reactivating a key must never leave the owner
/// without one; callers fail fast on this error before any network call.
pub fn signing_key(keys: &[Key]) -> KeyLifecycleResult<&UnlockedKey> {
    keys.iter()
        .filter(|key| key.primary)
        .find_map(|key| key.material.unlocked())
        .ok_or(KeyLifecycleError::NoUsablePrimaryKey)
}

/// Build and sign the manifest over the given key set.
///
/// Pure given its inputs: identical key lists and signing key produce
/// byte-identical manifests. Callers persist the result by submitting it
/// alongside the mutating API call.
pub async fn build_signed_key_list(
    keys: &[Key],
    provider: &dyn CryptoProvider,
) -> KeyLifecycleResult<SignedKeyList> {
    let signer = signing_key(keys)?;

    let items: Vec<SignedKeyListItem> = canonical_order(keys)
        .into_iter()
        .map(|key| SignedKeyListItem {
            id: key.id.clone(),
            fingerprint: key.fingerprint.clone(),
            flags: key.effective_flags().bits(),
            primary: u8::from(key.primary),
        })
        .collect();

    let data = serde_json::to_string(&items)
        .map_err(|e| KeyLifecycleError::Serialization(e.to_string()))?;
    let content_digest = digest::digest(&digest::SHA256, data.as_bytes());
    let signature = provider.sign(content_digest.as_ref(), signer).await?;

    debug!(items = items.len(), signer = %signer.fingerprint, "built signed key list");
    Ok(SignedKeyList { data, signature })
}
