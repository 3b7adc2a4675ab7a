//! Pool reconciler — the controller side of the resource store.
//!
//! The broker only ever bumps a pool's desired replica count and deletes
//! instances it is done with. Something else has to turn replicas into
//! instances and bring them up. In a real cluster that is the orchestrator's
//! controller; in standalone mode it is this reconciler.
//!
//! Each pass, per pool:
//!
//! ```text
//! count < replicas  → create Pending instances until equal
//! count > replicas  → delete surplus unclaimed instances (pending first)
//! Pending older than startup_delay → Running + Ready + address
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::store::{StateStore, epoch_secs};
use crate::types::*;

/// What one reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: u32,
    pub removed: u32,
    pub promoted: u32,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.removed == 0 && self.promoted == 0
    }
}

/// Converges pool instances toward their desired replica counts.
pub struct PoolReconciler {
    store: StateStore,
    /// How long a new instance stays Pending before it turns ready.
    startup_delay: Duration,
    /// Source for synthetic instance addresses.
    next_host: AtomicU32,
}

impl PoolReconciler {
    pub fn new(store: StateStore, startup_delay: Duration) -> Self {
        Self {
            store,
            startup_delay,
            next_host: AtomicU32::new(1),
        }
    }

    /// Run a single reconcile pass over every pool.
    pub fn reconcile_once(&self) -> StateResult<ReconcileReport> {
        let pools = self.store.list_pools()?;
        let instances = self.store.list_instances(&InstanceSelector::default())?;
        self.reconcile_snapshot(&pools, instances)
    }

    /// Converge toward `pools` starting from a listing taken earlier.
    ///
    /// Promotions and removals are guarded by the version each instance had
    /// in `instances`. An instance claimed, released, or otherwise rewritten
    /// since then is skipped and left for the next pass.
    fn reconcile_snapshot(
        &self,
        pools: &[DialectPool],
        instances: Vec<SandboxInstance>,
    ) -> StateResult<ReconcileReport> {
        let mut by_pool: HashMap<String, Vec<SandboxInstance>> = HashMap::new();
        for inst in instances {
            by_pool.entry(inst.pool.clone()).or_default().push(inst);
        }

        let mut report = ReconcileReport::default();
        let now = epoch_secs();

        for pool in pools {
            let mut instances = by_pool.remove(&pool.name).unwrap_or_default();
            let desired = pool.replicas as usize;

            if instances.len() < desired {
                for _ in instances.len()..desired {
                    instances.push(self.store.create_instance(pool)?);
                    report.created += 1;
                }
            } else if instances.len() > desired {
                let mut surplus = instances.len() - desired;
                // Pending before running, newest first.
                let mut removable: Vec<&SandboxInstance> = instances
                    .iter()
                    .filter(|i| i.claim == ClaimState::Unclaimed)
                    .collect();
                removable.sort_by_key(|i| (i.phase == InstancePhase::Running, std::cmp::Reverse(i.created_at)));
                let mut removed_names = Vec::new();
                for inst in removable {
                    if surplus == 0 {
                        break;
                    }
                    match self.store.delete_instance_if(&inst.name, inst.resource_version) {
                        Ok(()) => {
                            removed_names.push(inst.name.clone());
                            report.removed += 1;
                            surplus -= 1;
                        }
                        Err(e) if is_stale(&e) => {
                            debug!(instance = %inst.name, "instance changed since listing; not removing");
                        }
                        Err(e) => return Err(e),
                    }
                }
                instances.retain(|i| !removed_names.contains(&i.name));
            }

            for inst in instances.iter().filter(|i| i.phase == InstancePhase::Pending) {
                if now.saturating_sub(inst.created_at) < self.startup_delay.as_secs() {
                    continue;
                }
                match self.store.put_instance_if(&self.promote(inst), inst.resource_version) {
                    Ok(_) => report.promoted += 1,
                    Err(e) if is_stale(&e) => {
                        debug!(instance = %inst.name, "instance changed since listing; not promoting");
                    }
                    Err(e) => return Err(e),
                }
            }

            debug!(pool = %pool.name, replicas = pool.replicas, ?report, "pool reconciled");
        }

        Ok(report)
    }

    /// Run the reconcile loop until shutdown.
    pub async fn run(&self, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(interval_ms = interval.as_millis() as u64, "pool reconciler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match self.reconcile_once() {
                        Ok(report) if !report.is_empty() => {
                            info!(
                                created = report.created,
                                removed = report.removed,
                                promoted = report.promoted,
                                "pools reconciled"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "pool reconcile failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("pool reconciler shutting down");
                    break;
                }
            }
        }
    }

    fn promote(&self, inst: &SandboxInstance) -> SandboxInstance {
        let host = self.next_host.fetch_add(1, Ordering::Relaxed);
        let mut conditions = inst.conditions.clone();
        for kind in [ConditionKind::Initialized, ConditionKind::ContainersReady, ConditionKind::Ready] {
            conditions.retain(|c| c.kind != kind);
            conditions.push(InstanceCondition { kind, status: true });
        }
        SandboxInstance {
            phase: InstancePhase::Running,
            conditions,
            address: Some(format!("10.244.{}.{}", (host >> 8) & 0xff, host & 0xff)),
            ..inst.clone()
        }
    }
}

/// The write lost to a concurrent change; the next pass sees fresh state.
fn is_stale(e: &StateError) -> bool {
    e.is_conflict() || e.is_not_found()
}
