//! Core types and data structures

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque server-assigned key identifier, stable across flag changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(pub String);

impl KeyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Fingerprint derived from key material; immutable, used for
/// cross-referencing uploaded backups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(fp: &str) -> Self {
        Self(fp.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressId(pub String);

impl From<&str> for AddressId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The owner of a key set: the account's user keys, or one address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerId {
    User,
    Address(AddressId),
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerId::User => f.write_str("user"),
            OwnerId::Address(AddressId(id)) => write!(f, "address:{}", id),
        }
    }
}

/// Two-bit capability encoding per key.
///
/// Bit 0 ([`KeyFlags::NOT_OBSOLETE`]) means the key can be used to encrypt;
/// bit 1 ([`KeyFlags::NOT_COMPROMISED`]) means it can be used to sign.
/// A key record without flags (legacy/user keys) implies both capabilities,
/// see [`Key::effective_flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFlags(u8);

impl KeyFlags {
    /// Key can be used to encrypt.
    pub const NOT_OBSOLETE: u8 = 0b01;
    /// Key can be used to verify signatures.
    pub const NOT_COMPROMISED: u8 = 0b10;

    pub const ALL: KeyFlags = KeyFlags(Self::NOT_OBSOLETE | Self::NOT_COMPROMISED);
    pub const NONE: KeyFlags = KeyFlags(0);

    pub fn new(bits: u8) -> Self {
        Self(bits & (Self::NOT_OBSOLETE | Self::NOT_COMPROMISED))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn can_encrypt(self) -> bool {
        self.0 & Self::NOT_OBSOLETE != 0
    }

    pub fn can_sign(self) -> bool {
        self.0 & Self::NOT_COMPROMISED != 0
    }

    pub fn with(self, bit: u8) -> Self {
        Self::new(self.0 | bit)
    }

    pub fn without(self, bit: u8) -> Self {
        Self::new(self.0 & !bit)
    }
}

/// Passphrase protecting armored key material.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase(String);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase([REDACTED])")
    }
}

/// Master secret derived from a recovery phrase.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret(Vec<u8>);

impl MasterSecret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret([REDACTED])")
    }
}

/// Per-key salt used to derive the key passphrase from the account password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySalt(pub String);

impl KeySalt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Armored (encrypted) private key blob as stored on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmoredKey(pub String);

impl ArmoredKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A decrypted private key handle, usable in the current session.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct UnlockedKey {
    #[zeroize(skip)]
    pub fingerprint: Fingerprint,
    #[zeroize(skip)]
    pub version: u8,
    /// Email identity embedded in the key material, when present.
    #[zeroize(skip)]
    pub identity: Option<String>,
    pub secret: Vec<u8>,
}

impl fmt::Debug for UnlockedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockedKey")
            .field("fingerprint", &self.fingerprint)
            .field("version", &self.version)
            .field("identity", &self.identity)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Local knowledge about a key's private material.
#[derive(Debug, Clone)]
pub enum MaterialState {
    /// Unlocked and usable in this session.
    Decrypted(UnlockedKey),
    /// Present only as an armored blob; the passphrase is not known locally.
    Encrypted(ArmoredKey),
    /// Forwarding key; no local decryption is ever expected.
    Forwarding(ArmoredKey),
}

impl MaterialState {
    pub fn is_decrypted(&self) -> bool {
        matches!(self, MaterialState::Decrypted(_))
    }

    pub fn is_forwarding(&self) -> bool {
        matches!(self, MaterialState::Forwarding(_))
    }

    pub fn unlocked(&self) -> Option<&UnlockedKey> {
        match self {
            MaterialState::Decrypted(key) => Some(key),
            _ => None,
        }
    }

    pub fn armored(&self) -> Option<&ArmoredKey> {
        match self {
            MaterialState::Encrypted(armored) | MaterialState::Forwarding(armored) => Some(armored),
            MaterialState::Decrypted(_) => None,
        }
    }
}

/// One asymmetric key bound to the user or to one address.
///
/// `flags` and `primary` are only ever mutated through the
/// [`KeyMutationService`](crate::mutation::KeyMutationService), which
/// re-derives and submits a signed key list in the same transaction.
#[derive(Debug, Clone)]
pub struct Key {
    pub id: KeyId,
    pub fingerprint: Fingerprint,
    /// Algorithm generation tag; affects ordering and compatibility rules.
    pub version: u8,
    pub flags: Option<KeyFlags>,
    pub primary: bool,
    pub ownership: OwnerId,
    pub material: MaterialState,
}

impl Key {
    /// Flags with the legacy default applied: absent flags imply both
    /// capabilities.
    pub fn effective_flags(&self) -> KeyFlags {
        self.flags.unwrap_or(KeyFlags::ALL)
    }

    pub fn is_decrypted(&self) -> bool {
        self.material.is_decrypted()
    }

    pub fn is_v6(&self) -> bool {
        self.version >= 6
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressStatus {
    Enabled,
    Disabled,
}

/// Contextual facts about the address a key belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInfo {
    pub id: AddressId,
    pub email: String,
    pub status: AddressStatus,
}

impl AddressInfo {
    pub fn is_disabled(&self) -> bool {
        self.status == AddressStatus::Disabled
    }
}
