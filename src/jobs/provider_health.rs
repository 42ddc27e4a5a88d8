//! Provider health gate.
//!
//! A background scheduler probes every enabled provider on an interval and
//! keeps a per-provider record of the last outcome and the consecutive
//! failure count. Readiness is derived from those counters; it is a signal
//! only and never blocks request traversal.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{observability::metrics, providers::AdapterSet, transport::Transport};

/// Status of a provider's health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

/// Stored health state for a single provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealthState {
    pub provider: String,
    pub status: HealthStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub last_check: DateTime<Utc>,
    pub consecutive_failures: u32,
}

impl ProviderHealthState {
    fn new(provider: String) -> Self {
        Self {
            provider,
            status: HealthStatus::Unknown,
            latency_ms: 0,
            error: None,
            status_code: None,
            last_check: Utc::now(),
            consecutive_failures: 0,
        }
    }
}

/// Shared health map consulted by `/ready`.
pub struct HealthMonitor {
    states: DashMap<String, ProviderHealthState>,
    failure_threshold: u32,
}

impl HealthMonitor {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            states: DashMap::new(),
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Readiness holds while no provider has reached the failure threshold.
    pub fn is_ready(&self) -> bool {
        !self
            .states
            .iter()
            .any(|state| state.consecutive_failures >= self.failure_threshold)
    }

    /// Current state of every probed provider.
    pub fn snapshot(&self) -> Vec<ProviderHealthState> {
        let mut states: Vec<_> = self.states.iter().map(|s| s.clone()).collect();
        states.sort_by(|a, b| a.provider.cmp(&b.provider));
        states
    }

    /// Record one probe outcome.
    pub fn record(
        &self,
        provider: &str,
        healthy: bool,
        latency_ms: u64,
        status_code: Option<u16>,
        error: Option<String>,
    ) {
        let mut state = self
            .states
            .entry(provider.to_string())
            .or_insert_with(|| ProviderHealthState::new(provider.to_string()));

        let previous = state.status;
        state.status = if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        state.latency_ms = latency_ms;
        state.status_code = status_code;
        state.error = error;
        state.last_check = Utc::now();
        if healthy {
            state.consecutive_failures = 0;
        } else {
            state.consecutive_failures += 1;
        }

        if previous != state.status {
            tracing::info!(
                provider,
                status = ?state.status,
                consecutive_failures = state.consecutive_failures,
                "Provider health changed"
            );
        }
        metrics::record_health_probe(provider, healthy);
    }
}

/// Probe loop. Runs until the shutdown token fires.
pub async fn run(
    monitor: Arc<HealthMonitor>,
    adapters: AdapterSet,
    transport: Arc<Transport>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("Provider health monitor shutting down");
                return;
            }
            _ = ticker.tick() => {
                probe_all(&monitor, &adapters, &transport).await;
            }
        }
    }
}

async fn probe_all(monitor: &HealthMonitor, adapters: &AdapterSet, transport: &Transport) {
    for (name, adapter) in adapters.iter() {
        let probe = adapter.probe();
        let start = std::time::Instant::now();

        match transport.dispatch_once(name, &probe).await {
            Ok(response) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                let healthy = response.status.is_success() || response.status.is_redirection();
                let error = if healthy {
                    None
                } else {
                    Some(format!("HTTP {}", response.status.as_u16()))
                };
                monitor.record(name, healthy, latency_ms, Some(response.status.as_u16()), error);
            }
            Err(e) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                monitor.record(name, false, latency_ms, None, Some(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_flips_at_the_failure_threshold() {
        let monitor = HealthMonitor::new(3);
        assert!(monitor.is_ready());

        monitor.record("openai", false, 10, Some(503), Some("HTTP 503".into()));
        monitor.record("openai", false, 10, Some(503), Some("HTTP 503".into()));
        assert!(monitor.is_ready());

        monitor.record("openai", false, 10, Some(503), Some("HTTP 503".into()));
        assert!(!monitor.is_ready());
    }

    #[test]
    fn one_success_resets_the_counter() {
        let monitor = HealthMonitor::new(2);
        monitor.record("bedrock", false, 10, None, Some("timeout".into()));
        monitor.record("bedrock", true, 5, Some(200), None);
        monitor.record("bedrock", false, 10, None, Some("timeout".into()));
        assert!(monitor.is_ready());
    }

    #[test]
    fn snapshot_is_sorted_and_complete() {
        let monitor = HealthMonitor::new(3);
        monitor.record("vertex", true, 8, Some(200), None);
        monitor.record("anthropic", true, 9, Some(200), None);

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].provider, "anthropic");
        assert_eq!(snapshot[1].provider, "vertex");
        assert_eq!(snapshot[0].status, HealthStatus::Healthy);
    }
}
