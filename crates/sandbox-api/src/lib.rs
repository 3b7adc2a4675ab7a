//! sandbox-api — HTTP surface of the sandbox broker.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/allocate` | Claim a sandbox: `{"dialect": "postgres"}` |
//! | POST, DELETE | `/release?pod=NAME` | Delete a claimed sandbox |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/healthz` | Liveness check |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use sandbox_broker::Allocator;
use sandbox_metrics::FreeGauges;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub allocator: Arc<Allocator>,
    pub gauges: Arc<FreeGauges>,
}

/// Build the complete broker router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/allocate", post(handlers::allocate))
        .route("/release", post(handlers::release).delete(handlers::release))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}
