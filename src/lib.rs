//! Key Lifecycle & Reactivation Engine
//!
//! This crate manages the lifecycle of end-to-end encryption keys attached
//! to a user account and its addresses: deriving per-key capabilities and
//! permissions, building the signed key list manifest that commits an
//! owner's key set to the server, applying key mutations, and recovering
//! keys locked by a credential reset through three reactivation strategies.

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::new_without_default)]

pub mod api;
pub mod capabilities;
pub mod error;
pub mod keys;
pub mod mock;
pub mod mutation;
pub mod permissions;
pub mod provider;
pub mod reactivation;
pub mod skl;
pub mod types;

pub use api::{KeyApi, KeySaltEntry};
pub use capabilities::{derive_capabilities, CapabilityContext, KeyCapabilities};
pub use error::{KeyLifecycleError, KeyLifecycleResult, ReactivationFailure};
pub use keys::{display_order, exists_primary_v6, export_private_key, export_public_key};
pub use mutation::{FlagAction, KeyMutationService};
pub use permissions::{derive_permissions, KeyPermissions, PermissionContext};
pub use provider::{ArmoredKeyInfo, CryptoProvider};
pub use reactivation::{
    build_reactivation_requests, BackupFileStrategy, KeyReactivationRequest,
    PreviousPasswordStrategy, ReactivatedKey, ReactivationOrchestrator, ReactivationOutcome,
    ReactivationReport, ReactivationSet, ReactivationStatus, ReactivationStrategy,
    RecoveryPhraseStrategy, UploadedKey,
};
pub use skl::{build_signed_key_list, canonical_order, signing_key, SignedKeyList};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
