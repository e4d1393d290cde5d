//! Cryptographic capability provider
//!
//! The engine consumes PGP-style primitives as an external capability and
//! does not reimplement them. Implementations are expected to wrap a real
//! OpenPGP stack; [`crate::mock::MockCryptoProvider`] ships a deterministic
//! software stand-in for tests.

use async_trait::async_trait;

use crate::{
    error::KeyLifecycleResult,
    types::{ArmoredKey, Fingerprint, KeySalt, MasterSecret, Passphrase, UnlockedKey},
};

/// Metadata readable from an armored key without decrypting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmoredKeyInfo {
    pub fingerprint: Fingerprint,
    pub version: u8,
    pub identity: Option<String>,
}

#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Derive the key decryption passphrase from an account password and a
    /// per-key salt.
    async fn derive_key_password(
        &self,
        password: &str,
        salt: &KeySalt,
    ) -> KeyLifecycleResult<Passphrase>;

    /// Decrypt an armored private key. Fails with
    /// [`KeyLifecycleError::IncorrectPassword`](crate::error::KeyLifecycleError::IncorrectPassword)
    /// when the passphrase does not match.
    async fn decrypt_key(
        &self,
        armored: &ArmoredKey,
        passphrase: &Passphrase,
    ) -> KeyLifecycleResult<UnlockedKey>;

    /// Re-armor an unlocked key under a new passphrase.
    async fn encrypt_key(
        &self,
        key: &UnlockedKey,
        passphrase: &Passphrase,
    ) -> KeyLifecycleResult<ArmoredKey>;

    /// Produce a detached signature over `data`.
    async fn sign(&self, data: &[u8], signing_key: &UnlockedKey) -> KeyLifecycleResult<String>;

    /// Derive the recovery master secret from a mnemonic phrase.
    async fn derive_from_mnemonic(&self, phrase: &str) -> KeyLifecycleResult<MasterSecret>;

    /// Unlock a key using a recovery master secret. Fails with
    /// [`KeyLifecycleError::NoAssociation`](crate::error::KeyLifecycleError::NoAssociation)
    /// when the key is not recoverable by that secret.
    async fn unlock_with_secret(
        &self,
        armored: &ArmoredKey,
        secret: &MasterSecret,
    ) -> KeyLifecycleResult<UnlockedKey>;

    /// Read public metadata from an armored key.
    async fn inspect(&self, armored: &ArmoredKey) -> KeyLifecycleResult<ArmoredKeyInfo>;

    /// Re-bind the key's embedded identity metadata to a new email.
    async fn rebind_identity(
        &self,
        key: &UnlockedKey,
        email: &str,
    ) -> KeyLifecycleResult<UnlockedKey>;

    /// Export the armored public key of an unlocked key.
    async fn export_public_key(&self, key: &UnlockedKey) -> KeyLifecycleResult<String>;

    /// Export the armored public key embedded in an armored private key.
    async fn export_public_from_armored(&self, armored: &ArmoredKey) -> KeyLifecycleResult<String>;
}
