//! Liveness, readiness and metrics endpoints.
//!
//! `/health` answers while the process runs. `/ready` reflects the provider
//! health gate: it reports, never blocks; traversal remains the authority on
//! what actually runs.

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

use crate::{AppState, jobs::provider_health::ProviderHealthState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub providers: Vec<ProviderHealthState>,
}

pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.health.is_ready();
    let body = ReadyResponse {
        status: if ready { "ready" } else { "not_ready" },
        providers: state.health.snapshot(),
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();
    (
        [(http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
