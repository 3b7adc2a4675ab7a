//! Cluster resource client — the narrow interface the broker talks to.
//!
//! The broker never owns instances; it lists them, flips their claim state,
//! deletes them, and bumps pool replicas. Those five calls are all it needs
//! from whatever holds the authoritative record. `StateStore` implements the
//! trait directly; an adapter for a real orchestrator would implement the
//! same five methods.
//!
//! Methods return boxed futures so the trait stays object-safe and the
//! broker can hold an `Arc<dyn ClusterClient>`.

use std::future::Future;
use std::pin::Pin;

use crate::error::StateResult;
use crate::store::StateStore;
use crate::types::{ClaimState, InstanceSelector, PoolScale, SandboxInstance};

/// Boxed future returned by every [`ClusterClient`] call.
pub type ClusterFuture<'a, T> = Pin<Box<dyn Future<Output = StateResult<T>> + Send + 'a>>;

/// List, patch, delete, and scale operations over the shared resource store.
pub trait ClusterClient: Send + Sync {
    /// Point-in-time listing of instances matching `selector`, in store order.
    fn list_instances<'a>(&'a self, selector: &'a InstanceSelector)
    -> ClusterFuture<'a, Vec<SandboxInstance>>;

    /// Set an instance's claim state, guarded by the version observed at list time.
    ///
    /// Fails with `StateError::Conflict` if the stored version moved on.
    fn patch_claim<'a>(
        &'a self,
        name: &'a str,
        expected_version: u64,
        claim: ClaimState,
    ) -> ClusterFuture<'a, SandboxInstance>;

    /// Delete an instance. Fails with `StateError::NotFound` if it is absent.
    fn delete_instance<'a>(&'a self, name: &'a str) -> ClusterFuture<'a, ()>;

    /// Read a pool's scale sub-resource.
    fn get_scale<'a>(&'a self, pool: &'a str) -> ClusterFuture<'a, PoolScale>;

    /// Write a pool's scale sub-resource, guarded by `scale.resource_version`.
    fn update_scale<'a>(&'a self, pool: &'a str, scale: PoolScale) -> ClusterFuture<'a, PoolScale>;
}

impl ClusterClient for StateStore {
    fn list_instances<'a>(
        &'a self,
        selector: &'a InstanceSelector,
    ) -> ClusterFuture<'a, Vec<SandboxInstance>> {
        Box::pin(async move { StateStore::list_instances(self, selector) })
    }

    fn patch_claim<'a>(
        &'a self,
        name: &'a str,
        expected_version: u64,
        claim: ClaimState,
    ) -> ClusterFuture<'a, SandboxInstance> {
        Box::pin(async move { StateStore::patch_claim(self, name, expected_version, claim) })
    }

    fn delete_instance<'a>(&'a self, name: &'a str) -> ClusterFuture<'a, ()> {
        Box::pin(async move {
            if StateStore::delete_instance(self, name)? {
                Ok(())
            } else {
                Err(crate::StateError::NotFound(name.to_string()))
            }
        })
    }

    fn get_scale<'a>(&'a self, pool: &'a str) -> ClusterFuture<'a, PoolScale> {
        Box::pin(async move {
            self.get_pool(pool)?
                .map(|p| p.scale())
                .ok_or_else(|| crate::StateError::NotFound(pool.to_string()))
        })
    }

    fn update_scale<'a>(&'a self, pool: &'a str, scale: PoolScale) -> ClusterFuture<'a, PoolScale> {
        Box::pin(async move { StateStore::update_scale(self, pool, &scale) })
    }
}
