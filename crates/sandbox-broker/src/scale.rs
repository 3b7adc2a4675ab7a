//! Scale controller — grow a dialect's pool by exactly one replica.

use tracing::info;

use sandbox_state::{ClusterClient, PoolScale};

use crate::error::{BrokerError, BrokerResult};

/// Read the pool's replica count, add one, and write it back.
///
/// The write is guarded by the version read a moment earlier; a concurrent
/// update surfaces as a store error and is not retried. The store creates the
/// extra instance on its own schedule. Returns the new replica count.
pub async fn scale_up(client: &dyn ClusterClient, pool: &str) -> BrokerResult<u32> {
    let current = client
        .get_scale(pool)
        .await
        .map_err(BrokerError::store("failed to get pool scale"))?;

    let desired = PoolScale {
        replicas: current.replicas + 1,
        ..current
    };
    let updated = client
        .update_scale(pool, desired)
        .await
        .map_err(BrokerError::store("failed to scale pool"))?;

    info!(%pool, from = current.replicas, to = updated.replicas, "pool scaled up");
    Ok(updated.replicas)
}
