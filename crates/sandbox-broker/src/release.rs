//! Release — delete a sandbox the caller is done with.

use tracing::info;

use sandbox_state::{ClusterClient, StateError};

use crate::error::{BrokerError, BrokerResult};

/// Delete `name` from the store.
///
/// No claim-state check: releasing an instance you never held is on the
/// caller. An unknown name is `NotFound` rather than a silent success, since
/// names come from callers and typos should show.
pub async fn release(client: &dyn ClusterClient, name: &str) -> BrokerResult<()> {
    client.delete_instance(name).await.map_err(|e| match e {
        StateError::NotFound(name) => BrokerError::NotFound(name),
        other => BrokerError::ResourceStore {
            context: "failed to delete instance",
            source: other,
        },
    })?;
    info!(instance = %name, "instance released");
    Ok(())
}
