//! Broker error types.

use std::time::Duration;

use thiserror::Error;

use sandbox_state::{Dialect, StateError};

/// Errors that can occur while allocating or releasing sandboxes.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Missing or unsupported input; the caller can fix it.
    #[error("{0}")]
    Validation(String),

    /// The resource store was unreachable or rejected an operation.
    #[error("{context}: {source}")]
    ResourceStore {
        context: &'static str,
        #[source]
        source: StateError,
    },

    /// Another allocation claimed the instance first.
    #[error("instance {0} was claimed concurrently")]
    ClaimConflict(String),

    #[error("timed out after {}s waiting for a free {dialect} sandbox", waited.as_secs())]
    AllocationTimeout { dialect: Dialect, waited: Duration },

    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("allocation cancelled")]
    Cancelled,
}

impl BrokerError {
    /// Builds a closure that wraps a store error with `context`.
    pub(crate) fn store(context: &'static str) -> impl FnOnce(StateError) -> BrokerError {
        move |source| BrokerError::ResourceStore { context, source }
    }

    /// Whether the caller sent something it can fix (a 4xx, in HTTP terms).
    pub fn is_client_error(&self) -> bool {
        matches!(self, BrokerError::Validation(_))
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
