//! Claim arbiter — the one concurrency-critical step.
//!
//! A claim is a conditional write of `claim = Claimed`, guarded by the
//! resource version seen when the instance was listed. If anything touched
//! the instance in between (including another broker claiming it), the store
//! rejects the write and the arbiter moves on. Two callers can both see the
//! same free instance; at most one of them gets it.

use tracing::{debug, warn};

use sandbox_state::{ClaimState, ClusterClient, SandboxInstance, StateError};

use crate::error::{BrokerError, BrokerResult};

/// Claim one instance using the version observed at list time.
pub async fn claim(
    client: &dyn ClusterClient,
    instance: &SandboxInstance,
) -> BrokerResult<SandboxInstance> {
    client
        .patch_claim(&instance.name, instance.resource_version, ClaimState::Claimed)
        .await
        .map_err(|e| match e {
            StateError::Conflict { name, .. } => BrokerError::ClaimConflict(name),
            other => BrokerError::ResourceStore {
                context: "failed to claim instance",
                source: other,
            },
        })
}

/// Claim the first usable candidate, in order.
///
/// Candidates failing `usable` are skipped. Conflicts and store errors are
/// logged and the next candidate is tried; no candidate is tried twice.
/// Returns `None` when the sequence runs out.
pub async fn claim_first<F>(
    client: &dyn ClusterClient,
    candidates: &[SandboxInstance],
    usable: F,
) -> Option<SandboxInstance>
where
    F: Fn(&SandboxInstance) -> bool,
{
    for candidate in candidates {
        if !usable(candidate) {
            debug!(instance = %candidate.name, "instance not ready yet; skipping");
            continue;
        }
        match claim(client, candidate).await {
            Ok(claimed) => {
                debug!(instance = %claimed.name, "instance claimed");
                return Some(claimed);
            }
            Err(BrokerError::ClaimConflict(name)) => {
                debug!(instance = %name, "lost claim race; trying next candidate");
            }
            Err(e) => {
                warn!(instance = %candidate.name, error = %e, "claim failed; trying next candidate");
            }
        }
    }
    None
}
