//! Model routing.
//!
//! Maps a requested model name onto an ordered list of candidate providers:
//! an exact mapping wins, then the first matching routing pattern, and the
//! globally configured fallback providers are appended for implicit
//! traversal. A caller-pinned provider short-circuits resolution and gets no
//! fallback.
//!
//! Enumeration order of the configuration is authoritative throughout, which
//! is why the mapping tables are ordered maps.

use indexmap::IndexMap;
use regex::Regex;

use crate::{
    config::{FallbackConfig, GatewayConfig, ModelMapping, ProvidersConfig},
    providers::ResolvedTarget,
};

/// Error when resolving a model.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    #[error("No provider mapping for model '{0}'")]
    UnknownModel(String),
}

/// Pure decision component: owns the immutable routing tables.
pub struct Router {
    mappings: IndexMap<String, ModelMapping>,
    patterns: Vec<(Regex, String)>,
    fallback: FallbackConfig,
    providers: ProvidersConfig,
    config_loaded_at: i64,
}

impl Router {
    /// Build the router from validated configuration. Pattern regexes were
    /// syntax-checked during config load; compiling them again here cannot
    /// fail for a validated config.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, regex::Error> {
        let mut patterns = Vec::with_capacity(config.routing.patterns.len());
        for pattern in &config.routing.patterns {
            patterns.push((
                Regex::new(&pattern.pattern)?,
                pattern.default_provider.clone(),
            ));
        }

        let mut fallback = config.routing.fallback.clone();
        if !config.features.auto_fallback {
            fallback.enabled = false;
        }

        Ok(Self {
            mappings: config.model_mappings.clone(),
            patterns,
            fallback,
            providers: config.providers.clone(),
            config_loaded_at: chrono::Utc::now().timestamp(),
        })
    }

    /// Maximum number of providers a traversal may try.
    pub fn max_attempts(&self) -> usize {
        self.fallback.max_attempts.max(1)
    }

    /// Timestamp stamped onto `/v1/models` entries.
    pub fn config_loaded_at(&self) -> i64 {
        self.config_loaded_at
    }

    /// Resolve a model to an ordered provider list.
    ///
    /// A pinned provider that is enabled and supports the model is returned
    /// alone, with no fallback; a pin that cannot serve the model falls
    /// through to normal resolution.
    pub fn resolve(
        &self,
        model: &str,
        preferred: Option<&str>,
    ) -> Result<Vec<String>, RouterError> {
        if let Some(preferred) = preferred.filter(|p| !p.is_empty())
            && self.providers.is_enabled(preferred)
            && self.provider_supports(preferred, model)
        {
            return Ok(vec![preferred.to_string()]);
        }

        let mut candidates: Vec<String> = Vec::new();

        if let Some(mapping) = self.mappings.get(model) {
            if let Some(default) = &mapping.default_provider
                && self.providers.is_enabled(default)
            {
                candidates.push(default.clone());
            }
            for provider in mapping.providers.keys() {
                if self.providers.is_enabled(provider) && !candidates.contains(provider) {
                    candidates.push(provider.clone());
                }
            }
        } else {
            for (regex, provider) in &self.patterns {
                if regex.is_match(model) {
                    if self.providers.is_enabled(provider) {
                        candidates.push(provider.clone());
                    }
                    break;
                }
            }
        }

        if candidates.is_empty() {
            return Err(RouterError::UnknownModel(model.to_string()));
        }

        if self.fallback.enabled {
            for provider in &self.fallback.providers {
                if self.providers.is_enabled(provider) && !candidates.contains(provider) {
                    candidates.push(provider.clone());
                }
            }
        }

        Ok(candidates)
    }

    /// Resolve the upstream target a provider uses for a canonical model.
    /// Providers without a sub-entry get the identity mapping.
    pub fn target(&self, provider: &str, model: &str) -> ResolvedTarget {
        let mapping = self
            .mappings
            .get(model)
            .and_then(|m| m.providers.get(provider));
        ResolvedTarget::from_mapping(model, mapping)
    }

    /// Canonical model names resolvable across enabled providers, with the
    /// provider that would serve each by default. Pattern-routed names are
    /// open-ended and cannot be enumerated.
    pub fn known_models(&self) -> Vec<(String, String)> {
        self.mappings
            .iter()
            .filter_map(|(model, mapping)| {
                let owner = mapping
                    .default_provider
                    .iter()
                    .chain(mapping.providers.keys())
                    .find(|p| self.providers.is_enabled(p))?;
                Some((model.clone(), owner.clone()))
            })
            .collect()
    }

    /// True when the model resolves at all (mapping or pattern).
    pub fn is_known_model(&self, model: &str) -> bool {
        self.resolve(model, None).is_ok()
    }

    fn provider_supports(&self, provider: &str, model: &str) -> bool {
        if let Some(mapping) = self.mappings.get(model) {
            return mapping.default_provider.as_deref() == Some(provider)
                || mapping.providers.contains_key(provider);
        }
        self.patterns
            .iter()
            .any(|(regex, default)| regex.is_match(model) && default == provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_router(toml: &str) -> Router {
        let config = GatewayConfig::from_toml_str(toml).unwrap();
        Router::from_config(&config).unwrap()
    }

    fn full_config() -> Router {
        test_router(
            r#"
            [providers.openai]
            enabled = true
            [providers.anthropic]
            enabled = true
            [providers.bedrock]
            enabled = true
            [providers.oracle]
            enabled = false

            [model_mappings."claude-3-sonnet"]
            default_provider = "bedrock"
            [model_mappings."claude-3-sonnet".providers.bedrock]
            model = "anthropic.claude-3-sonnet-20240229-v1:0"
            region = "us-east-1"
            [model_mappings."claude-3-sonnet".providers.anthropic]
            model = "claude-3-sonnet-20240229"

            [model_mappings."gpt-3.5-turbo"]
            default_provider = "openai"

            [[routing.patterns]]
            pattern = "^gpt-"
            default_provider = "openai"

            [[routing.patterns]]
            pattern = "^claude-"
            default_provider = "anthropic"

            [routing.fallback]
            enabled = true
            providers = ["openai", "oracle"]
            max_attempts = 3
        "#,
        )
    }

    #[test]
    fn exact_mapping_orders_default_first() {
        let router = full_config();
        let candidates = router.resolve("claude-3-sonnet", None).unwrap();
        assert_eq!(candidates, ["bedrock", "anthropic", "openai"]);
    }

    #[test]
    fn no_duplicates_and_no_disabled_providers() {
        let router = full_config();
        for model in ["claude-3-sonnet", "gpt-3.5-turbo", "gpt-4o-new"] {
            let candidates = router.resolve(model, None).unwrap();
            let mut seen = std::collections::HashSet::new();
            for candidate in &candidates {
                assert!(seen.insert(candidate.clone()), "duplicate in {candidates:?}");
                assert_ne!(candidate, "oracle", "disabled provider in {candidates:?}");
            }
        }
    }

    #[test]
    fn pattern_routing_uses_first_match() {
        let router = full_config();
        let candidates = router.resolve("gpt-4o-mini", None).unwrap();
        assert_eq!(candidates[0], "openai");

        let candidates = router.resolve("claude-9-experimental", None).unwrap();
        assert_eq!(candidates[0], "anthropic");
    }

    #[test]
    fn unknown_model_is_an_error() {
        let router = full_config();
        assert!(matches!(
            router.resolve("gpt-oss-harmony", None),
            Err(RouterError::UnknownModel(_))
        ));
        // `gpt-oss-harmony` matches ^gpt-; use a truly unmatched name too
        assert!(matches!(
            router.resolve("llama-3-70b", None),
            Err(RouterError::UnknownModel(_))
        ));
    }

    #[test]
    fn pinned_provider_short_circuits_without_fallback() {
        let router = full_config();
        let candidates = router.resolve("claude-3-sonnet", Some("anthropic")).unwrap();
        assert_eq!(candidates, ["anthropic"]);
    }

    #[test]
    fn pinned_disabled_provider_falls_through() {
        let router = full_config();
        let candidates = router.resolve("claude-3-sonnet", Some("oracle")).unwrap();
        assert_eq!(candidates[0], "bedrock");
    }

    #[test]
    fn pinned_unsupporting_provider_falls_through() {
        let router = full_config();
        // bedrock has no mapping for gpt-3.5-turbo and no matching pattern
        let candidates = router.resolve("gpt-3.5-turbo", Some("bedrock")).unwrap();
        assert_eq!(candidates[0], "openai");
    }

    #[test]
    fn upstream_model_resolution_reads_the_mapping() {
        let router = full_config();
        let target = router.target("bedrock", "claude-3-sonnet");
        assert_eq!(
            target.upstream_model,
            "anthropic.claude-3-sonnet-20240229-v1:0"
        );
        assert_eq!(target.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn unmapped_provider_gets_identity_mapping() {
        let router = full_config();
        let target = router.target("openai", "gpt-3.5-turbo");
        assert_eq!(target.upstream_model, "gpt-3.5-turbo");
    }

    #[test]
    fn disabled_fallback_appends_nothing() {
        let router = test_router(
            r#"
            [providers.openai]
            enabled = true
            [providers.anthropic]
            enabled = true

            [model_mappings."claude-3"]
            default_provider = "anthropic"

            [routing.fallback]
            enabled = false
            providers = ["openai"]
        "#,
        );
        assert_eq!(router.resolve("claude-3", None).unwrap(), ["anthropic"]);
    }

    #[test]
    fn auto_fallback_feature_gates_the_fallback_list() {
        let router = test_router(
            r#"
            [providers.openai]
            enabled = true
            [providers.anthropic]
            enabled = true

            [model_mappings."claude-3"]
            default_provider = "anthropic"

            [routing.fallback]
            enabled = true
            providers = ["openai"]

            [features]
            auto_fallback = false
        "#,
        );
        assert_eq!(router.resolve("claude-3", None).unwrap(), ["anthropic"]);
    }

    #[test]
    fn known_models_skips_fully_disabled_mappings() {
        let router = test_router(
            r#"
            [providers.openai]
            enabled = true
            [providers.oracle]
            enabled = false

            [model_mappings."gpt-4o"]
            default_provider = "openai"
            [model_mappings."cohere.command-r"]
            default_provider = "oracle"
        "#,
        );
        let models = router.known_models();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].0, "gpt-4o");
    }
}
