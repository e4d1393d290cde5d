//! Capability derivation
//!
//! Pure functions computing a key's effective capabilities from its flags
//! bitset plus contextual facts (address status, decryption state, primary
//! cardinality). Total over the whole input domain; every field is considered
//! in every evaluation.

use crate::types::{AddressInfo, Key, KeyFlags};

/// Input facts for capability derivation.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityContext {
    pub flags: Option<KeyFlags>,
    pub is_decrypted: bool,
    pub is_address_disabled: bool,
    pub is_primary: bool,
    pub version: u8,
    /// Whether the owner's key list holds a primary v6 key.
    pub exists_primary_v6: bool,
    pub is_forwarding: bool,
}

impl CapabilityContext {
    /// Build the context for one key within its owner's key list.
    pub fn for_key(key: &Key, address: Option<&AddressInfo>, exists_primary_v6: bool) -> Self {
        Self {
            flags: key.flags,
            is_decrypted: key.is_decrypted(),
            is_address_disabled: address.map(|a| a.is_disabled()).unwrap_or(false),
            is_primary: key.primary,
            version: key.version,
            exists_primary_v6,
            is_forwarding: key.material.is_forwarding(),
        }
    }
}

/// A key's derived capability state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCapabilities {
    pub can_encrypt: bool,
    pub can_sign: bool,
    pub is_obsolete: bool,
    pub is_compromised: bool,
    pub is_primary: bool,
    /// A pre-v6 key that is nominally primary only while a v6 primary exists.
    pub is_primary_compatibility: bool,
    pub is_forwarding: bool,
}

pub fn derive_capabilities(ctx: &CapabilityContext) -> KeyCapabilities {
    let can_encrypt = ctx.flags.map(KeyFlags::can_encrypt).unwrap_or(true);
    let can_sign = ctx.flags.map(KeyFlags::can_sign).unwrap_or(true);
    let is_compromised = !can_encrypt && !can_sign;
    // Obsolete is only meaningful for a usable, enabled key.
    let is_obsolete = ctx.is_decrypted && !ctx.is_address_disabled && !can_encrypt;
    let is_primary_compatibility = ctx.exists_primary_v6 && ctx.is_primary && ctx.version != 6;

    KeyCapabilities {
        can_encrypt,
        can_sign,
        is_obsolete,
        is_compromised,
        is_primary: ctx.is_primary,
        is_primary_compatibility,
        is_forwarding: ctx.is_forwarding,
    }
}
