//! Key collection helpers and export operations

use tracing::debug;

use crate::{
    error::{KeyLifecycleError, KeyLifecycleResult},
    provider::CryptoProvider,
    types::{ArmoredKey, Key, MaterialState, Passphrase},
};

/// Whether the key list holds a primary v6 key; feeds the
/// primary-for-compatibility capability rule.
pub fn exists_primary_v6(keys: &[Key]) -> bool {
    keys.iter().any(|key| key.primary && key.version == 6)
}

/// Display order: the v6 primary is shown first, any pre-v6 key still
/// flagged primary (the compatibility key) immediately after it, then the
/// rest in stable order. This ordering is a presentation concern only; the
/// signed key list uses [`crate::skl::canonical_order`].
pub fn display_order(keys: &[Key]) -> Vec<&Key> {
    let has_v6_primary = exists_primary_v6(keys);
    let mut ordered: Vec<&Key> = keys.iter().collect();
    ordered.sort_by_key(|key| {
        if key.primary && key.version == 6 {
            0u8
        } else if key.primary && has_v6_primary {
            1
        } else if key.primary {
            0
        } else {
            2
        }
    });
    ordered
}

/// Export the armored public key. Always permitted; public key material is
/// never sensitive.
pub async fn export_public_key(
    key: &Key,
    provider: &dyn CryptoProvider,
) -> KeyLifecycleResult<String> {
    match &key.material {
        MaterialState::Decrypted(unlocked) => provider.export_public_key(unlocked).await,
        MaterialState::Encrypted(armored) | MaterialState::Forwarding(armored) => {
            provider.export_public_from_armored(armored).await
        }
    }
}

/// Export the private key re-armored under a caller-supplied passphrase.
/// Requires locally decrypted material.
pub async fn export_private_key(
    key: &Key,
    passphrase: &Passphrase,
    provider: &dyn CryptoProvider,
) -> KeyLifecycleResult<ArmoredKey> {
    let unlocked = key
        .material
        .unlocked()
        .ok_or_else(|| KeyLifecycleError::NotDecrypted(key.id.to_string()))?;
    debug!(key_id = %key.id, "exporting private key");
    provider.encrypt_key(unlocked, passphrase).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCryptoProvider;
    use crate::types::{KeyFlags, OwnerId};

    fn key(id: &str, version: u8, primary: bool, decrypted: bool) -> Key {
        let material = if decrypted {
            MaterialState::Decrypted(MockCryptoProvider::unlocked_key(id, version, None))
        } else {
            MaterialState::Encrypted(MockCryptoProvider::armored_key(
                id,
                version,
                None,
                &Passphrase::new("pw"),
            ))
        };
        Key {
            id: id.into(),
            fingerprint: id.into(),
            version,
            flags: Some(KeyFlags::ALL),
            primary,
            ownership: OwnerId::User,
            material,
        }
    }

    #[test]
    fn test_display_order_v6_before_compatibility_primary() {
        let keys = vec![key("v4", 4, true, true), key("other", 4, false, true), key("v6", 6, true, true)];
        let ordered = display_order(&keys);
        let ids: Vec<&str> = ordered.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, vec!["v6", "v4", "other"]);
    }

    #[test]
    fn test_display_order_without_v6_primary_is_stable() {
        let keys = vec![key("b", 4, false, true), key("a", 4, true, true), key("c", 4, false, true)];
        let ordered = display_order(&keys);
        let ids: Vec<&str> = ordered.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_export_public_key_any_material_state() {
        let provider = MockCryptoProvider::new();
        assert_eq!(
            export_public_key(&key("k1", 4, false, true), &provider).await.unwrap(),
            "pub:k1"
        );
        assert_eq!(
            export_public_key(&key("k2", 4, false, false), &provider).await.unwrap(),
            "pub:k2"
        );
    }

    #[tokio::test]
    async fn test_export_private_key_requires_decrypted_material() {
        let provider = MockCryptoProvider::new();
        let passphrase = Passphrase::new("export-pw");

        let exported =
            export_private_key(&key("k1", 4, false, true), &passphrase, &provider).await.unwrap();
        let unlocked = provider.decrypt_key(&exported, &passphrase).await.unwrap();
        assert_eq!(unlocked.fingerprint.as_str(), "k1");

        let err = export_private_key(&key("k2", 4, false, false), &passphrase, &provider)
            .await
            .unwrap_err();
        assert!(matches!(err, KeyLifecycleError::NotDecrypted(_)));
    }
}
