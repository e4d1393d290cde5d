//! Software mock collaborators for testing
//!
//! `MockCryptoProvider` stands in for a real OpenPGP stack with a
//! transparent JSON armor envelope; no real cryptography is performed, but
//! the observable contract (wrong passphrase fails, signatures are
//! deterministic per key and data) holds. `MockKeyApi` records calls and
//! can be scripted to fail per endpoint.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use ring::digest;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    api::{KeyApi, KeySaltEntry},
    error::{KeyLifecycleError, KeyLifecycleResult},
    provider::{ArmoredKeyInfo, CryptoProvider},
    skl::SignedKeyList,
    types::{
        ArmoredKey, Fingerprint, KeyFlags, KeyId, KeySalt, MasterSecret, Passphrase, UnlockedKey,
    },
};

fn sha256(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA256, data).as_ref().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// The mock armor envelope. Transparent on purpose; tests construct and
/// inspect it through the provider API only.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MockArmor {
    fingerprint: String,
    version: u8,
    identity: Option<String>,
    passphrase: String,
    /// Hex-encoded recovery secrets this key is additionally unlockable by.
    recovery: Vec<String>,
    secret: String,
}

impl MockArmor {
    fn parse(armored: &ArmoredKey) -> KeyLifecycleResult<Self> {
        serde_json::from_str(armored.as_str())
            .map_err(|e| KeyLifecycleError::Serialization(format!("bad mock armor: {}", e)))
    }

    fn render(&self) -> KeyLifecycleResult<ArmoredKey> {
        let body = serde_json::to_string(self)
            .map_err(|e| KeyLifecycleError::Serialization(e.to_string()))?;
        Ok(ArmoredKey(body))
    }

    fn unlock(&self) -> KeyLifecycleResult<UnlockedKey> {
        let secret = hex::decode(&self.secret)
            .map_err(|e| KeyLifecycleError::Serialization(format!("bad mock secret: {}", e)))?;
        Ok(UnlockedKey {
            fingerprint: Fingerprint(self.fingerprint.clone()),
            version: self.version,
            identity: self.identity.clone(),
            secret,
        })
    }
}

#[derive(Debug, Default)]
pub struct MockCryptoProvider;

impl MockCryptoProvider {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic unlocked key for a fingerprint; the secret bytes are a
    /// digest of the fingerprint so two keys never share material.
    pub fn unlocked_key(fingerprint: &str, version: u8, identity: Option<&str>) -> UnlockedKey {
        UnlockedKey {
            fingerprint: Fingerprint(fingerprint.to_string()),
            version,
            identity: identity.map(str::to_string),
            secret: sha256(fingerprint.as_bytes()),
        }
    }

    /// Armored key unlockable by `passphrase` only.
    pub fn armored_key(
        fingerprint: &str,
        version: u8,
        identity: Option<&str>,
        passphrase: &Passphrase,
    ) -> ArmoredKey {
        Self::armored_key_with_recovery(fingerprint, version, identity, passphrase, &[])
    }

    /// Armored key unlockable by `passphrase` or any of the given recovery
    /// secrets.
    pub fn armored_key_with_recovery(
        fingerprint: &str,
        version: u8,
        identity: Option<&str>,
        passphrase: &Passphrase,
        recovery: &[MasterSecret],
    ) -> ArmoredKey {
        let armor = MockArmor {
            fingerprint: fingerprint.to_string(),
            version,
            identity: identity.map(str::to_string),
            passphrase: passphrase.as_str().to_string(),
            recovery: recovery.iter().map(|s| hex::encode(s.as_bytes())).collect(),
            secret: hex::encode(sha256(fingerprint.as_bytes())),
        };
        armor.render().expect("mock armor serialization cannot fail")
    }
}

#[async_trait]
impl CryptoProvider for MockCryptoProvider {
    async fn derive_key_password(
        &self,
        password: &str,
        salt: &KeySalt,
    ) -> KeyLifecycleResult<Passphrase> {
        let material = format!("{}:{}", password, salt.as_str());
        Ok(Passphrase::new(hex::encode(sha256(material.as_bytes()))))
    }

    async fn decrypt_key(
        &self,
        armored: &ArmoredKey,
        passphrase: &Passphrase,
    ) -> KeyLifecycleResult<UnlockedKey> {
        let armor = MockArmor::parse(armored)?;
        if !constant_time_eq(armor.passphrase.as_bytes(), passphrase.as_str().as_bytes()) {
            return Err(KeyLifecycleError::IncorrectPassword);
        }
        armor.unlock()
    }

    async fn encrypt_key(
        &self,
        key: &UnlockedKey,
        passphrase: &Passphrase,
    ) -> KeyLifecycleResult<ArmoredKey> {
        MockArmor {
            fingerprint: key.fingerprint.as_str().to_string(),
            version: key.version,
            identity: key.identity.clone(),
            passphrase: passphrase.as_str().to_string(),
            recovery: Vec::new(),
            secret: hex::encode(&key.secret),
        }
        .render()
    }

    async fn sign(&self, data: &[u8], signing_key: &UnlockedKey) -> KeyLifecycleResult<String> {
        let mut input = signing_key.secret.clone();
        input.extend_from_slice(data);
        Ok(format!("sig:{}:{}", signing_key.fingerprint, hex::encode(sha256(&input))))
    }

    async fn derive_from_mnemonic(&self, phrase: &str) -> KeyLifecycleResult<MasterSecret> {
        Ok(MasterSecret::new(sha256(phrase.as_bytes())))
    }

    async fn unlock_with_secret(
        &self,
        armored: &ArmoredKey,
        secret: &MasterSecret,
    ) -> KeyLifecycleResult<UnlockedKey> {
        let armor = MockArmor::parse(armored)?;
        let encoded = hex::encode(secret.as_bytes());
        if !armor.recovery.iter().any(|candidate| candidate == &encoded) {
            return Err(KeyLifecycleError::NoAssociation);
        }
        armor.unlock()
    }

    async fn inspect(&self, armored: &ArmoredKey) -> KeyLifecycleResult<ArmoredKeyInfo> {
        let armor = MockArmor::parse(armored)?;
        Ok(ArmoredKeyInfo {
            fingerprint: Fingerprint(armor.fingerprint),
            version: armor.version,
            identity: armor.identity,
        })
    }

    async fn rebind_identity(
        &self,
        key: &UnlockedKey,
        email: &str,
    ) -> KeyLifecycleResult<UnlockedKey> {
        debug!(fingerprint = %key.fingerprint, email, "rebinding key identity");
        let mut rebound = key.clone();
        rebound.identity = Some(email.to_string());
        Ok(rebound)
    }

    async fn export_public_key(&self, key: &UnlockedKey) -> KeyLifecycleResult<String> {
        Ok(format!("pub:{}", key.fingerprint))
    }

    async fn export_public_from_armored(&self, armored: &ArmoredKey) -> KeyLifecycleResult<String> {
        let armor = MockArmor::parse(armored)?;
        Ok(format!("pub:{}", armor.fingerprint))
    }
}

/// One recorded server interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    GetKeySalts(crate::types::OwnerId),
    ReactivateKey { key_id: KeyId, with_manifest: bool },
    SetKeyFlags { key_id: KeyId, flags: u8 },
    SetKeyPrimary(KeyId),
    DeleteKey(KeyId),
    RefreshOwner(crate::types::OwnerId),
}

/// In-memory server double: records every call, returns registered salts,
/// and fails any endpoint scripted through [`MockKeyApi::fail_on`].
#[derive(Debug, Default)]
pub struct MockKeyApi {
    salts: Mutex<HashMap<KeyId, KeySalt>>,
    calls: Mutex<Vec<ApiCall>>,
    failing: Mutex<HashSet<String>>,
}

impl MockKeyApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_salt(&self, key_id: KeyId, salt: KeySalt) {
        self.salts.lock().await.insert(key_id, salt);
    }

    /// Make every subsequent call to `endpoint` fail with `ServerRejected`.
    pub async fn fail_on(&self, endpoint: &str) {
        self.failing.lock().await.insert(endpoint.to_string());
    }

    pub async fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().await.clone()
    }

    async fn check(&self, endpoint: &str) -> KeyLifecycleResult<()> {
        if self.failing.lock().await.contains(endpoint) {
            return Err(KeyLifecycleError::ServerRejected(format!(
                "{} unavailable",
                endpoint
            )));
        }
        Ok(())
    }

    async fn record(&self, call: ApiCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl KeyApi for MockKeyApi {
    async fn get_key_salts(
        &self,
        owner: &crate::types::OwnerId,
    ) -> KeyLifecycleResult<Vec<KeySaltEntry>> {
        self.record(ApiCall::GetKeySalts(owner.clone())).await;
        self.check("get_key_salts").await?;
        let salts = self.salts.lock().await;
        Ok(salts
            .iter()
            .map(|(key_id, salt)| KeySaltEntry { key_id: key_id.clone(), salt: salt.clone() })
            .collect())
    }

    async fn reactivate_key(
        &self,
        key_id: &KeyId,
        _reencrypted: &ArmoredKey,
        manifest: Option<&SignedKeyList>,
    ) -> KeyLifecycleResult<()> {
        self.record(ApiCall::ReactivateKey {
            key_id: key_id.clone(),
            with_manifest: manifest.is_some(),
        })
        .await;
        self.check("reactivate_key").await
    }

    async fn set_key_flags(
        &self,
        key_id: &KeyId,
        flags: KeyFlags,
        _manifest: &SignedKeyList,
    ) -> KeyLifecycleResult<()> {
        self.record(ApiCall::SetKeyFlags { key_id: key_id.clone(), flags: flags.bits() }).await;
        self.check("set_key_flags").await
    }

    async fn set_key_primary(
        &self,
        key_id: &KeyId,
        _manifest: &SignedKeyList,
    ) -> KeyLifecycleResult<()> {
        self.record(ApiCall::SetKeyPrimary(key_id.clone())).await;
        self.check("set_key_primary").await
    }

    async fn delete_key(
        &self,
        key_id: &KeyId,
        _manifest: &SignedKeyList,
    ) -> KeyLifecycleResult<()> {
        self.record(ApiCall::DeleteKey(key_id.clone())).await;
        self.check("delete_key").await
    }

    async fn refresh_owner(&self, owner: &crate::types::OwnerId) -> KeyLifecycleResult<()> {
        self.record(ApiCall::RefreshOwner(owner.clone())).await;
        self.check("refresh_owner").await
    }
}
