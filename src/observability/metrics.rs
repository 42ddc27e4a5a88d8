//! Metric recording helpers.
//!
//! Thin wrappers over the `metrics` macros so call sites stay terse and the
//! label vocabulary stays consistent. The Prometheus recorder is installed in
//! `main` and rendered by `GET /metrics`.

use metrics::{counter, histogram};

/// Record a gateway-level error by taxonomy kind.
pub fn record_gateway_error(kind: &str, status: u16) {
    counter!(
        "gateway_errors_total",
        "kind" => kind.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Record one upstream dispatch attempt.
pub fn record_upstream_request(provider: &str, model: &str, status: u16, latency_ms: u64) {
    counter!(
        "upstream_requests_total",
        "provider" => provider.to_string(),
        "model" => model.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    histogram!(
        "upstream_request_duration_ms",
        "provider" => provider.to_string(),
    )
    .record(latency_ms as f64);
}

/// Record an authentication outcome.
pub fn record_auth(outcome: &str) {
    counter!("auth_attempts_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a provider health probe outcome.
pub fn record_health_probe(provider: &str, healthy: bool) {
    counter!(
        "provider_health_probes_total",
        "provider" => provider.to_string(),
        "healthy" => healthy.to_string(),
    )
    .increment(1);
}

/// Record token usage reported by an upstream.
pub fn record_token_usage(provider: &str, model: &str, prompt: u32, completion: u32) {
    counter!(
        "tokens_total",
        "provider" => provider.to_string(),
        "model" => model.to_string(),
        "direction" => "prompt",
    )
    .increment(prompt as u64);
    counter!(
        "tokens_total",
        "provider" => provider.to_string(),
        "model" => model.to_string(),
        "direction" => "completion",
    )
    .increment(completion as u64);
}
