//! Reactivation state machine
//!
//! Tracks per-key status across a batch of keys needing reactivation,
//! independent of which recovery path is in use. The machine performs no
//! I/O; transitions are driven externally by the orchestrator and by the
//! recovery-path caller (which only ever moves a key `Inactive → Uploaded`
//! after confirming a fingerprint match). Re-applying the same transition
//! is a no-op.

use tracing::debug;

use crate::{
    error::{KeyLifecycleError, KeyLifecycleResult, ReactivationFailure},
    types::{Fingerprint, KeyId, OwnerId, UnlockedKey},
};

use super::KeyReactivationRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactivationStatus {
    /// Key is present on the server but not decrypted locally.
    Inactive,
    /// User supplied backup material matching this key's fingerprint, not
    /// yet processed (or the strategy handed control back for a per-key
    /// credential).
    Uploaded,
    /// A strategy is working on this key.
    Decrypting,
    Success,
    Error(ReactivationFailure),
}

impl ReactivationStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ReactivationStatus::Inactive => "inactive",
            ReactivationStatus::Uploaded => "uploaded",
            ReactivationStatus::Decrypting => "decrypting",
            ReactivationStatus::Success => "success",
            ReactivationStatus::Error(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReactivationStatus::Success | ReactivationStatus::Error(_))
    }
}

/// Mutable per-key record inside a reactivation batch.
#[derive(Debug, Clone)]
pub struct ReactivationEntry {
    pub key_id: KeyId,
    pub fingerprint: Fingerprint,
    pub owner: OwnerId,
    pub status: ReactivationStatus,
    /// Backup material attached on the `Inactive → Uploaded` edge.
    pub uploaded: Option<UnlockedKey>,
}

/// The batch-wide collection of reactivation entries.
#[derive(Debug, Default)]
pub struct ReactivationSet {
    entries: Vec<ReactivationEntry>,
}

impl ReactivationSet {
    /// Create one `Inactive` entry per key needing reactivation.
    pub fn initialize(requests: &[KeyReactivationRequest]) -> Self {
        let entries = requests
            .iter()
            .flat_map(|request| {
                request.to_reactivate.iter().filter_map(|key_id| {
                    let key = request.keys.iter().find(|key| &key.id == key_id)?;
                    Some(ReactivationEntry {
                        key_id: key.id.clone(),
                        fingerprint: key.fingerprint.clone(),
                        owner: request.owner.clone(),
                        status: ReactivationStatus::Inactive,
                        uploaded: None,
                    })
                })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ReactivationEntry] {
        &self.entries
    }

    pub fn entry(&self, key_id: &KeyId) -> Option<&ReactivationEntry> {
        self.entries.iter().find(|entry| &entry.key_id == key_id)
    }

    /// Attach uploaded backup material to an entry, moving it to
    /// `Uploaded`. The material's fingerprint must match the entry's.
    pub fn attach_upload(
        &mut self,
        key_id: &KeyId,
        material: UnlockedKey,
    ) -> KeyLifecycleResult<()> {
        let entry = self.entry_mut(key_id)?;
        if material.fingerprint != entry.fingerprint {
            return Err(KeyLifecycleError::KeyIdMismatch {
                expected: entry.fingerprint.to_string(),
                actual: material.fingerprint.to_string(),
            });
        }
        entry.uploaded = Some(material);
        self.transition(key_id, ReactivationStatus::Uploaded)
    }

    /// Apply a status transition. Idempotent: re-applying the current
    /// status is a no-op. Legal edges:
    ///
    /// - `Inactive → Uploaded | Decrypting | Error`
    /// - `Uploaded → Decrypting | Error`
    /// - `Decrypting → Uploaded | Success | Error` (back to `Uploaded`
    ///   when a strategy reports it needs a per-key credential)
    pub fn transition(
        &mut self,
        key_id: &KeyId,
        status: ReactivationStatus,
    ) -> KeyLifecycleResult<()> {
        let entry = self.entry_mut(key_id)?;
        if entry.status == status {
            return Ok(());
        }

        let legal = match (&entry.status, &status) {
            (ReactivationStatus::Inactive, ReactivationStatus::Uploaded)
            | (ReactivationStatus::Inactive, ReactivationStatus::Decrypting)
            | (ReactivationStatus::Inactive, ReactivationStatus::Error(_))
            | (ReactivationStatus::Uploaded, ReactivationStatus::Decrypting)
            | (ReactivationStatus::Uploaded, ReactivationStatus::Error(_))
            | (ReactivationStatus::Decrypting, ReactivationStatus::Uploaded)
            | (ReactivationStatus::Decrypting, ReactivationStatus::Success)
            | (ReactivationStatus::Decrypting, ReactivationStatus::Error(_)) => true,
            _ => false,
        };
        if !legal {
            return Err(KeyLifecycleError::InvalidTransition {
                from: entry.status.name(),
                to: status.name(),
            });
        }

        debug!(key_id = %key_id, from = entry.status.name(), to = status.name(), "reactivation transition");
        entry.status = status;
        Ok(())
    }

    fn entry_mut(&mut self, key_id: &KeyId) -> KeyLifecycleResult<&mut ReactivationEntry> {
        self.entries
            .iter_mut()
            .find(|entry| &entry.key_id == key_id)
            .ok_or_else(|| KeyLifecycleError::KeyNotFound(key_id.to_string()))
    }
}
