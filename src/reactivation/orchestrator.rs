//! Reactivation batch orchestrator

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    api::KeyApi,
    error::{KeyLifecycleError, KeyLifecycleResult, ReactivationFailure},
    provider::CryptoProvider,
    skl::build_signed_key_list,
    types::{MaterialState, OwnerId},
};

use super::{
    state::{ReactivationSet, ReactivationStatus},
    KeyReactivationRequest, ReactivationOutcome, ReactivationStrategy, StrategyContext,
};

/// Batch totals. `failed` counts keys whose entry ended in `Error`;
/// `needs_credential` counts keys handed back for a per-key credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactivationReport {
    pub reactivated: usize,
    pub failed: usize,
    pub needs_credential: usize,
}

/// Drives a batch of reactivation requests through one strategy.
///
/// Failures are isolated per key: each failed key is recorded on its state
/// entry and the batch continues. The run as a whole only returns an error
/// on state-machine misuse, never on a key that merely could not be
/// recovered.
pub struct ReactivationOrchestrator {
    api: Arc<dyn KeyApi>,
    provider: Arc<dyn CryptoProvider>,
}

impl ReactivationOrchestrator {
    pub fn new(api: Arc<dyn KeyApi>, provider: Arc<dyn CryptoProvider>) -> Self {
        Self { api, provider }
    }

    pub async fn run(
        &self,
        requests: &[KeyReactivationRequest],
        strategy: &dyn ReactivationStrategy,
        state: &mut ReactivationSet,
    ) -> KeyLifecycleResult<ReactivationReport> {
        let mut report = ReactivationReport::default();

        for request in requests {
            self.run_owner(request, strategy, state, &mut report).await?;
        }

        // Local key state after a batch is a cache at best; the server
        // holds the authoritative view. A failed refresh does not undo
        // the reactivations already accepted.
        let owners: HashSet<&OwnerId> = requests.iter().map(|request| &request.owner).collect();
        for owner in owners {
            if let Err(err) = self.api.refresh_owner(owner).await {
                warn!(%owner, error = %err, "owner refresh after reactivation failed");
            }
        }

        info!(
            reactivated = report.reactivated,
            failed = report.failed,
            needs_credential = report.needs_credential,
            "reactivation batch finished"
        );
        Ok(report)
    }

    async fn run_owner(
        &self,
        request: &KeyReactivationRequest,
        strategy: &dyn ReactivationStrategy,
        state: &mut ReactivationSet,
        report: &mut ReactivationReport,
    ) -> KeyLifecycleResult<()> {
        // Working copy of the owner's key list. Every successful
        // reactivation folds into it so later manifests in the same batch
        // see earlier recoveries.
        let mut working = request.keys.clone();

        for key_id in &request.to_reactivate {
            let Some(key) = working.iter().find(|key| &key.id == key_id).cloned() else {
                warn!(%key_id, "reactivation target missing from owner key list");
                report.failed += 1;
                continue;
            };

            if key.is_decrypted() {
                state.transition(
                    key_id,
                    ReactivationStatus::Error(ReactivationFailure::AlreadyDecrypted),
                )?;
                report.failed += 1;
                continue;
            }
            if key.material.is_forwarding() {
                state.transition(
                    key_id,
                    ReactivationStatus::Error(ReactivationFailure::Other(
                        "forwarding keys are not reactivatable".to_string(),
                    )),
                )?;
                report.failed += 1;
                continue;
            }

            state.transition(key_id, ReactivationStatus::Decrypting)?;

            let outcome = {
                let entry = state
                    .entry(key_id)
                    .ok_or_else(|| KeyLifecycleError::KeyNotFound(key_id.to_string()))?;
                let ctx = StrategyContext {
                    owner: &request.owner,
                    address: request.address.as_ref(),
                    entry,
                };
                strategy.reactivate(&key, &ctx).await
            };

            let reactivated = match outcome {
                Ok(ReactivationOutcome::Reactivated(reactivated)) => reactivated,
                Ok(ReactivationOutcome::NeedsCredential { fingerprint }) => {
                    debug!(%key_id, %fingerprint, "key handed back for a credential");
                    state.transition(key_id, ReactivationStatus::Uploaded)?;
                    report.needs_credential += 1;
                    continue;
                }
                Err(err) => {
                    warn!(%key_id, error = %err, "key reactivation failed");
                    state.transition(
                        key_id,
                        ReactivationStatus::Error(ReactivationFailure::from(&err)),
                    )?;
                    report.failed += 1;
                    continue;
                }
            };

            // Hypothetical post-reactivation key list; committed to
            // `working` only after the server accepts.
            let mut updated = working.clone();
            if let Some(slot) = updated.iter_mut().find(|key| &key.id == key_id) {
                slot.material = MaterialState::Decrypted(reactivated.unlocked.clone());
            }

            let manifest = match &request.owner {
                OwnerId::Address(_) => {
                    match build_signed_key_list(&updated, self.provider.as_ref()).await {
                        Ok(manifest) => Some(manifest),
                        Err(err) => {
                            // Manifest failures surface before any network
                            // call; the server never sees a half-submitted
                            // reactivation.
                            warn!(%key_id, error = %err, "signed key list build failed");
                            state.transition(
                                key_id,
                                ReactivationStatus::Error(ReactivationFailure::from(&err)),
                            )?;
                            report.failed += 1;
                            continue;
                        }
                    }
                }
                OwnerId::User => None,
            };

            match self
                .api
                .reactivate_key(key_id, &reactivated.reencrypted, manifest.as_ref())
                .await
            {
                Ok(()) => {
                    working = updated;
                    state.transition(key_id, ReactivationStatus::Success)?;
                    report.reactivated += 1;
                }
                Err(err) => {
                    warn!(%key_id, error = %err, "server rejected reactivation");
                    state.transition(
                        key_id,
                        ReactivationStatus::Error(ReactivationFailure::from(&err)),
                    )?;
                    report.failed += 1;
                }
            }
        }

        Ok(())
    }
}
