//! Azure OpenAI adapter.
//!
//! Azure speaks the OpenAI wire format but addresses deployments rather than
//! models, pins an `api-version` query parameter, and authenticates with an
//! `api-key` header instead of a bearer token.

use http::{HeaderMap, StatusCode};

use crate::{
    api_types::{ChatCompletion, ChatCompletionRequest},
    config::ProviderSettings,
    providers::{
        AdapterError, ChatAdapter, ProviderRequest, ProviderSecrets, ResolvedTarget,
        SigningDirective, clamp_temperature,
        error::{ProviderErrorInfo, parse_openai_error},
        openai::parse_openai_compatible_response,
    },
};

const DEFAULT_API_VERSION: &str = "2024-02-01";

pub struct AzureOpenAiAdapter {
    api_key: String,
    endpoint: String,
    api_version: String,
}

impl AzureOpenAiAdapter {
    pub fn new(settings: &ProviderSettings, secrets: &ProviderSecrets) -> Result<Self, String> {
        let endpoint = settings
            .endpoint()
            .map(str::to_string)
            .or_else(|| secrets.azure_endpoint.clone())
            .ok_or_else(|| {
                "azure provider requires an endpoint (config or AZURE_OPENAI_ENDPOINT)".to_string()
            })?;

        Ok(Self {
            api_key: secrets.azure_api_key.clone().unwrap_or_default(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: settings
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        })
    }

    fn signing(&self) -> SigningDirective {
        SigningDirective::ApiKey {
            header: "api-key",
            value: self.api_key.clone(),
        }
    }
}

impl ChatAdapter for AzureOpenAiAdapter {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn prepare(
        &self,
        target: &ResolvedTarget,
        request: &ChatCompletionRequest,
    ) -> Result<ProviderRequest, AdapterError> {
        // Azure routes on the deployment name; fall back to the upstream model
        // id for accounts whose deployments mirror model names.
        let deployment = target
            .deployment
            .as_deref()
            .unwrap_or(&target.upstream_model);
        let api_version = target.api_version.as_deref().unwrap_or(&self.api_version);

        let mut upstream = request.clone();
        upstream.model = target.upstream_model.clone();
        upstream.temperature = upstream
            .temperature
            .map(|t| clamp_temperature(self.name(), t, 0.0, 2.0));

        let body = serde_json::to_vec(&upstream)?;
        Ok(ProviderRequest::post_json(
            format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.endpoint, deployment, api_version
            ),
            body,
            self.signing(),
        ))
    }

    fn parse_response(
        &self,
        model: &str,
        _status: StatusCode,
        body: &[u8],
    ) -> Result<ChatCompletion, AdapterError> {
        parse_openai_compatible_response(model, body)
    }

    fn parse_error(
        &self,
        status: StatusCode,
        _headers: &HeaderMap,
        body: &[u8],
    ) -> ProviderErrorInfo {
        parse_openai_error(status, body)
    }

    fn probe(&self) -> ProviderRequest {
        ProviderRequest::get(
            format!(
                "{}/openai/models?api-version={}",
                self.endpoint, self.api_version
            ),
            self.signing(),
        )
    }

    fn base_endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn transport_signing(&self) -> SigningDirective {
        self.signing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::{Message, MessageContent};

    fn adapter() -> AzureOpenAiAdapter {
        AzureOpenAiAdapter {
            api_key: "azure-key".to_string(),
            endpoint: "https://myresource.openai.azure.com".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-4o".to_string(),
            messages: vec![Message::User {
                content: MessageContent::Text("hi".to_string()),
                name: None,
            }],
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop: None,
            tools: None,
            tool_choice: None,
            response_format: None,
            stream: false,
            user: None,
        }
    }

    #[test]
    fn prepare_addresses_the_deployment_path() {
        let mapping = crate::config::ModelTarget {
            deployment: Some("gpt4o-prod".to_string()),
            ..Default::default()
        };
        let target = ResolvedTarget::from_mapping("gpt-4o", Some(&mapping));
        let prepared = adapter().prepare(&target, &request()).unwrap();
        assert_eq!(
            prepared.url,
            "https://myresource.openai.azure.com/openai/deployments/gpt4o-prod/chat/completions?api-version=2024-02-01"
        );
        assert!(matches!(
            prepared.signing,
            SigningDirective::ApiKey { header: "api-key", .. }
        ));
    }

    #[test]
    fn deployment_falls_back_to_model_id() {
        let target = ResolvedTarget::from_mapping("gpt-4o", None);
        let prepared = adapter().prepare(&target, &request()).unwrap();
        assert!(prepared.url.contains("/openai/deployments/gpt-4o/"));
    }

    #[test]
    fn mapping_api_version_overrides_default() {
        let mapping = crate::config::ModelTarget {
            api_version: Some("2024-06-01".to_string()),
            ..Default::default()
        };
        let target = ResolvedTarget::from_mapping("gpt-4o", Some(&mapping));
        let prepared = adapter().prepare(&target, &request()).unwrap();
        assert!(prepared.url.ends_with("api-version=2024-06-01"));
    }

    #[test]
    fn missing_endpoint_is_a_construction_error() {
        let settings = ProviderSettings::default();
        let secrets = ProviderSecrets::default();
        assert!(AzureOpenAiAdapter::new(&settings, &secrets).is_err());
    }
}
