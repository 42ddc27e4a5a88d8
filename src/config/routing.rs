//! Model mapping and routing configuration.
//!
//! Pattern routing depends on enumeration order, so both the model-mapping
//! table and the pattern list preserve the order they appear in the file.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::default_true;

/// Mapping of one canonical model name onto upstream backends.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ModelMapping {
    /// Provider tried first when the caller does not pin one.
    #[serde(default)]
    pub default_provider: Option<String>,

    /// Per-provider mapping details, in configuration order.
    #[serde(default)]
    pub providers: IndexMap<String, ModelTarget>,
}

/// How one provider addresses a canonical model.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ModelTarget {
    /// Upstream model id. Absent means the canonical name is used verbatim.
    #[serde(default)]
    pub model: Option<String>,

    /// Region override (Bedrock, Oracle).
    #[serde(default)]
    pub region: Option<String>,

    /// Location override (Vertex).
    #[serde(default)]
    pub location: Option<String>,

    /// Deployment name for providers that name deployments rather than models
    /// (Azure OpenAI).
    #[serde(default)]
    pub deployment: Option<String>,

    /// API version override.
    #[serde(default)]
    pub api_version: Option<String>,

    /// Free-form metadata. Parsed and preserved; request transforms keyed on
    /// it are not wired through.
    #[serde(default)]
    pub metadata: Option<toml::Value>,
}

/// Pattern routing and fallback behavior.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Consulted in order when no exact mapping exists.
    #[serde(default)]
    pub patterns: Vec<RoutePattern>,

    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// A regex routed to a default provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutePattern {
    pub pattern: String,
    pub default_provider: String,
}

/// Global fallback traversal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Providers appended to every resolution, after the model's own
    /// candidates, skipping duplicates and disabled entries.
    #[serde(default)]
    pub providers: Vec<String>,

    /// Upper bound on providers actually tried per request.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: Vec::new(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_attempts() -> usize {
    3
}
