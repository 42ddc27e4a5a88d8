//! Provider configuration.
//!
//! Every upstream backend shares one settings shape: enablement, endpoint
//! override, region/project, timeout, and retry policy. Provider secrets are
//! never kept in the config file; they come from the environment, read exactly
//! once at startup.
//!
//! # Example
//!
//! ```toml
//! [providers.bedrock]
//! enabled = true
//! region = "us-east-1"
//! timeout = 60
//! max_retries = 2
//! retry_delay = 500
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::default_true;

/// Provider configurations keyed by provider name.
///
/// Enumeration order is the configuration file's order and is preserved; the
/// router relies on it when appending fallback candidates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(flatten)]
    providers: IndexMap<String, ProviderSettings>,
}

impl ProvidersConfig {
    /// Get a provider's settings by name.
    pub fn get(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.get(name)
    }

    /// True when the provider exists and is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.providers.get(name).is_some_and(|p| p.enabled)
    }

    /// Iterate providers in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProviderSettings)> {
        self.providers.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate enabled providers in configuration order.
    pub fn iter_enabled(&self) -> impl Iterator<Item = (&str, &ProviderSettings)> {
        self.iter().filter(|(_, p)| p.enabled)
    }

    #[cfg(test)]
    pub fn insert(&mut self, name: &str, settings: ProviderSettings) {
        self.providers.insert(name.to_string(), settings);
    }
}

/// Settings for a single upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    /// Disabled providers are skipped everywhere: routing, fallback, health.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Endpoint override (full URL). Falls back to the provider's well-known
    /// endpoint, or to the environment for providers configured there.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Alias for `endpoint` kept for configs written against the base-URL key.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Region (Bedrock, Oracle) or location (Vertex).
    #[serde(default)]
    pub region: Option<String>,

    /// Project identifier (Vertex, watsonx).
    #[serde(default)]
    pub project_id: Option<String>,

    /// API version pinned for providers that version their wire (Azure, watsonx).
    #[serde(default)]
    pub api_version: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs", rename = "timeout")]
    pub timeout_secs: u64,

    /// Retry attempts after the initial request for 429/5xx/transport faults.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries in milliseconds.
    #[serde(default = "default_retry_delay_ms", rename = "retry_delay")]
    pub retry_delay_ms: u64,

    /// Retry spacing: constant or linearly increasing.
    #[serde(default)]
    pub backoff: RetryBackoff,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            base_url: None,
            region: None,
            project_id: None,
            api_version: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff: RetryBackoff::default(),
        }
    }
}

impl ProviderSettings {
    /// Resolved endpoint: `endpoint` wins over `base_url`.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .or(self.base_url.as_deref())
            .map(|s| s.trim_end_matches('/'))
    }

    /// The retry policy derived from these settings.
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay_ms: self.retry_delay_ms,
            backoff: self.backoff,
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// Spacing of retry delays.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoff {
    #[default]
    Constant,
    Linear,
}

/// Retry policy applied by the transport.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay_ms: u64,
    pub backoff: RetryBackoff,
}

impl RetryPolicy {
    /// Whether a response status should trigger another attempt.
    pub fn should_retry_status(&self, status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }

    /// Delay before the given 0-indexed retry attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let millis = match self.backoff {
            RetryBackoff::Constant => self.delay_ms,
            RetryBackoff::Linear => self.delay_ms * (attempt as u64 + 1),
        };
        std::time::Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_provider_is_not_enabled() {
        let config: ProvidersConfig = toml::from_str(
            r#"
            [openai]
            enabled = false
            [anthropic]
            enabled = true
        "#,
        )
        .unwrap();
        assert!(!config.is_enabled("openai"));
        assert!(config.is_enabled("anthropic"));
        assert!(!config.is_enabled("missing"));
    }

    #[test]
    fn provider_order_is_preserved() {
        let config: ProvidersConfig = toml::from_str(
            r#"
            [oracle]
            [bedrock]
            [anthropic]
        "#,
        )
        .unwrap();
        let names: Vec<_> = config.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["oracle", "bedrock", "anthropic"]);
    }

    #[test]
    fn endpoint_prefers_endpoint_over_base_url() {
        let settings: ProviderSettings = toml::from_str(
            r#"
            endpoint = "https://a.example.com/"
            base_url = "https://b.example.com"
        "#,
        )
        .unwrap();
        assert_eq!(settings.endpoint(), Some("https://a.example.com"));
    }

    #[test]
    fn retry_statuses() {
        let policy = ProviderSettings::default().retry();
        assert!(policy.should_retry_status(429));
        assert!(policy.should_retry_status(503));
        assert!(!policy.should_retry_status(400));
        assert!(!policy.should_retry_status(200));
    }

    #[test]
    fn linear_backoff_spacing() {
        let policy = RetryPolicy {
            max_retries: 3,
            delay_ms: 100,
            backoff: RetryBackoff::Linear,
        };
        assert_eq!(policy.delay_for_attempt(0).as_millis(), 100);
        assert_eq!(policy.delay_for_attempt(2).as_millis(), 300);

        let constant = RetryPolicy {
            backoff: RetryBackoff::Constant,
            ..policy
        };
        assert_eq!(constant.delay_for_attempt(2).as_millis(), 100);
    }
}
