//! Configuration module for the gateway.
//!
//! The gateway is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. `$VAR` without braces is
//! deliberately not supported.
//!
//! # Example
//!
//! ```toml
//! [providers.openai]
//! enabled = true
//! base_url = "https://api.openai.com"
//!
//! [model_mappings."gpt-4o"]
//! default_provider = "openai"
//! ```

mod providers;
mod routing;

use std::path::Path;

pub use providers::*;
pub use routing::*;
use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
///
/// All sections are optional with defaults, so a minimal file only declares
/// providers and model mappings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication and credential store configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Request limits (rate limiting, global deadline).
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Upstream provider configurations keyed by provider name.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Canonical model name → per-provider mapping table.
    /// Insertion order is authoritative and preserved.
    #[serde(default)]
    pub model_mappings: indexmap::IndexMap<String, ModelMapping>,

    /// Pattern routing and fallback configuration.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Feature toggles.
    #[serde(default)]
    pub features: FeaturesConfig,

    /// Provider health gate configuration.
    #[serde(default)]
    pub health: HealthConfig,
}

/// Provider health gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Seconds between probe rounds.
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,

    /// Readiness turns false once any enabled provider reaches this many
    /// consecutive probe failures.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_health_interval(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

fn default_health_interval() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    3
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded before
    /// parsing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string, expanding `${VAR}` references.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: GatewayConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (model, mapping) in &self.model_mappings {
            if let Some(default) = &mapping.default_provider
                && self.providers.get(default).is_none()
            {
                return Err(ConfigError::Validation(format!(
                    "model_mappings.'{}': default_provider '{}' is not defined",
                    model, default
                )));
            }
            for provider in mapping.providers.keys() {
                if self.providers.get(provider).is_none() {
                    return Err(ConfigError::Validation(format!(
                        "model_mappings.'{}': provider '{}' is not defined",
                        model, provider
                    )));
                }
            }
        }
        for (idx, pattern) in self.routing.patterns.iter().enumerate() {
            regex::Regex::new(&pattern.pattern).map_err(|e| {
                ConfigError::Validation(format!("routing.patterns[{}]: invalid regex: {}", idx, e))
            })?;
            if self.providers.get(&pattern.default_provider).is_none() {
                return Err(ConfigError::Validation(format!(
                    "routing.patterns[{}]: default_provider '{}' is not defined",
                    idx, pattern.default_provider
                )));
            }
        }
        for provider in &self.routing.fallback.providers {
            if self.providers.get(provider).is_none() {
                return Err(ConfigError::Validation(format!(
                    "routing.fallback: provider '{}' is not defined",
                    provider
                )));
            }
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_body_limit")]
    pub request_body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_body_limit_bytes: default_body_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    4 * 1024 * 1024
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Path of the sqlite credential store.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Require a second factor on direct credential authentication.
    #[serde(default)]
    pub require_two_factor: bool,

    /// Lifetime of minted session tokens in seconds.
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime_secs: u64,

    /// How often the session sweeper runs.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Expired sessions are physically removed once they are this far past
    /// their expiry.
    #[serde(default = "default_sweep_grace")]
    pub sweep_grace_secs: u64,

    /// Upper bound on concurrent credential-hash verifications.
    #[serde(default = "default_verify_concurrency")]
    pub verify_concurrency: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            require_two_factor: false,
            session_lifetime_secs: default_session_lifetime(),
            sweep_interval_secs: default_sweep_interval(),
            sweep_grace_secs: default_sweep_grace(),
            verify_concurrency: default_verify_concurrency(),
        }
    }
}

fn default_database_path() -> String {
    "palisade.db".to_string()
}

fn default_session_lifetime() -> u64 {
    24 * 60 * 60
}

fn default_sweep_interval() -> u64 {
    60 * 60
}

fn default_sweep_grace() -> u64 {
    24 * 60 * 60
}

fn default_verify_concurrency() -> usize {
    4
}

/// Request limits.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Optional per-request global deadline in seconds. Unset means no global
    /// deadline; per-provider timeouts still apply.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// In-process, per-principal rate limiting over a rolling minute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_minute: default_rpm(),
        }
    }
}

fn default_rpm() -> u32 {
    60
}

/// Feature toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesConfig {
    /// Streaming is accepted on the wire but answered with a not-implemented
    /// fault; the toggle is parsed for forward compatibility.
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub cost_tracking: bool,
    #[serde(default = "default_true")]
    pub auto_fallback: bool,
    #[serde(default)]
    pub response_caching: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            streaming: false,
            cost_tracking: false,
            auto_fallback: true,
            response_caching: false,
        }
    }
}

pub(crate) fn default_true() -> bool {
    true
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// References appearing after a `#` comment marker are left untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let reference = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let commented = commented_spans(input);
    let mut unresolved: Option<String> = None;

    let expanded = reference.replace_all(input, |caps: &regex::Captures| {
        let whole = caps.get(0).unwrap();
        if commented.iter().any(|span| span.contains(&whole.start())) {
            return whole.as_str().to_string();
        }
        match std::env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => {
                unresolved.get_or_insert_with(|| caps[1].to_string());
                whole.as_str().to_string()
            }
        }
    });

    match unresolved {
        Some(name) => Err(ConfigError::EnvVarNotFound(name)),
        None => Ok(expanded.into_owned()),
    }
}

/// Byte ranges of the input covered by `#` comments, one per commented line.
fn commented_spans(input: &str) -> Vec<std::ops::Range<usize>> {
    let mut spans = Vec::new();
    let mut offset = 0;
    for line in input.split_inclusive('\n') {
        if let Some(hash) = line.find('#') {
            spans.push(offset + hash..offset + line.len());
        }
        offset += line.len();
    }
    spans
}
