//! HTTP route handlers and router assembly.

pub mod auth;
pub mod chat;
pub mod health;
pub mod models;
pub mod passthrough;

use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{AppState, middleware::request_id_middleware};

/// Assemble the full application router.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.request_body_limit_bytes;
    let global_deadline = state.config.limits.request_timeout_secs;

    let router = Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/models", get(models::list_models))
        .route("/v1/models/{id}", get(models::get_model))
        .route("/providers/{name}/{*path}", post(passthrough::passthrough))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/sessions", get(auth::sessions))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(body_limit));

    // Optional per-request global deadline; per-provider timeouts still apply
    // underneath it.
    let router = match global_deadline {
        Some(secs) => router.layer(TimeoutLayer::new(Duration::from_secs(secs))),
        None => router,
    };

    router.with_state(state)
}
