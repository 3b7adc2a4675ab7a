//! Free-instance locator.

use tracing::debug;

use sandbox_state::{ClusterClient, Dialect, InstanceSelector, SandboxInstance};

use crate::error::{BrokerError, BrokerResult};

/// List instances of `dialect` that are unclaimed and running, in store order.
///
/// The listing is a point-in-time snapshot and may include instances that
/// are not ready yet; callers re-check with [`SandboxInstance::is_ready`].
/// Nothing matching is an empty vector, not an error.
pub async fn locate_free(
    client: &dyn ClusterClient,
    dialect: Dialect,
) -> BrokerResult<Vec<SandboxInstance>> {
    let selector = InstanceSelector::free(dialect);
    let instances = client
        .list_instances(&selector)
        .await
        .map_err(BrokerError::store("failed to list instances"))?;
    debug!(%dialect, found = instances.len(), "free instances located (pre-filter)");
    Ok(instances)
}
