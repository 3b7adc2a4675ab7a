//! HTTP handlers.
//!
//! Allocation and release go through the shared `Allocator`; metrics are
//! read from the aggregator's gauges without touching the store.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::warn;

use sandbox_broker::BrokerError;

use crate::ApiState;

/// Error body, shared by every route.
#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ErrorBody {
            success: false,
            message: msg.to_string(),
        }),
    )
}

fn broker_error(e: &BrokerError) -> axum::response::Response {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error_response(&e.to_string(), status).into_response()
}

// ── Allocate ───────────────────────────────────────────────────

/// Allocate request body.
#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    #[serde(default)]
    pub dialect: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AllocateResponse {
    #[serde(rename = "connectionString")]
    pub connection_string: String,
    pub pod_name: String,
}

/// POST /allocate
pub async fn allocate(
    State(state): State<ApiState>,
    body: Result<Json<AllocateRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match body {
        Ok(req) => req,
        Err(rejection) => {
            warn!(error = %rejection, "rejected allocate request body");
            return error_response("Invalid request body", StatusCode::BAD_REQUEST).into_response();
        }
    };

    let dialect = req.dialect.unwrap_or_default();
    match state.allocator.allocate(&dialect).await {
        Ok(allocation) => Json(AllocateResponse {
            connection_string: allocation.connection,
            pod_name: allocation.instance,
        })
        .into_response(),
        Err(e) => {
            warn!(%dialect, error = %e, "allocation failed");
            broker_error(&e)
        }
    }
}

// ── Release ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReleaseQuery {
    pub pod: Option<String>,
}

/// POST|DELETE /release?pod=NAME
pub async fn release(
    State(state): State<ApiState>,
    Query(query): Query<ReleaseQuery>,
) -> impl IntoResponse {
    let Some(pod) = query.pod.filter(|p| !p.is_empty()) else {
        return error_response("pod parameter is required", StatusCode::BAD_REQUEST).into_response();
    };

    match state.allocator.release(&pod).await {
        Ok(()) => Json(serde_json::json!({
            "status": "released",
            "pod": pod,
        }))
        .into_response(),
        Err(e) => {
            warn!(%pod, error = %e, "release failed");
            broker_error(&e)
        }
    }
}

// ── Metrics & health ───────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = sandbox_metrics::render_prometheus(&state.gauges);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
