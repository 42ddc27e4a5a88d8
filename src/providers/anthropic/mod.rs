//! Anthropic Claude adapter.
//!
//! Translates canonical requests to the Anthropic Messages API: system
//! messages are extracted into the top-level `system` block, `max_tokens` is
//! mandatory on this wire (defaulted when the caller omits it), and tools map
//! onto `tools[].input_schema`.

mod convert;
mod types;

use convert::{convert_messages, convert_response, convert_tool_choice, convert_tools};
use http::{HeaderMap, StatusCode};
use types::{AnthropicRequest, AnthropicResponse};

use crate::{
    api_types::{ChatCompletion, ChatCompletionRequest},
    config::ProviderSettings,
    providers::{
        AdapterError, ChatAdapter, ProviderRequest, ProviderSecrets, ResolvedTarget,
        SigningDirective, base_url_or, clamp_temperature,
        error::{ProviderErrorInfo, parse_anthropic_error},
        split_system_messages,
    },
};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default max tokens if not specified.
const DEFAULT_MAX_TOKENS: u32 = 4096;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicAdapter {
    api_key: String,
    base_url: String,
}

impl AnthropicAdapter {
    pub fn new(settings: &ProviderSettings, secrets: &ProviderSecrets) -> Self {
        Self {
            api_key: secrets.anthropic_api_key.clone().unwrap_or_default(),
            base_url: base_url_or(settings, DEFAULT_BASE_URL).to_string(),
        }
    }

    fn signing(&self) -> SigningDirective {
        SigningDirective::ApiKey {
            header: "x-api-key",
            value: self.api_key.clone(),
        }
    }
}

impl ChatAdapter for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn prepare(
        &self,
        target: &ResolvedTarget,
        request: &ChatCompletionRequest,
    ) -> Result<ProviderRequest, AdapterError> {
        let (system, rest) = split_system_messages(&request.messages);

        let tools = convert_tools(request.tools.as_deref());
        let tool_choice = if tools.is_some() {
            convert_tool_choice(request.tool_choice.as_ref())
        } else {
            None
        };

        let anthropic_request = AnthropicRequest {
            model: target.upstream_model.clone(),
            messages: convert_messages(&rest),
            max_tokens: match request.max_tokens {
                Some(0) | None => DEFAULT_MAX_TOKENS,
                Some(n) => n,
            },
            system: if system.is_empty() { None } else { Some(system) },
            temperature: request
                .temperature
                .map(|t| clamp_temperature(self.name(), t, 0.0, 1.0)),
            top_p: request.top_p,
            stop_sequences: request.stop.clone().map(|s| s.into_vec()),
            tools,
            tool_choice,
        };

        let body = serde_json::to_vec(&anthropic_request)?;
        Ok(ProviderRequest::post_json(
            format!("{}/v1/messages", self.base_url),
            body,
            self.signing(),
        )
        .with_header("anthropic-version", ANTHROPIC_VERSION.to_string()))
    }

    fn parse_response(
        &self,
        model: &str,
        _status: StatusCode,
        body: &[u8],
    ) -> Result<ChatCompletion, AdapterError> {
        let response: AnthropicResponse = serde_json::from_slice(body)
            .map_err(|e| AdapterError::UnexpectedResponse(e.to_string()))?;
        Ok(convert_response(response, model))
    }

    fn parse_error(
        &self,
        status: StatusCode,
        _headers: &HeaderMap,
        body: &[u8],
    ) -> ProviderErrorInfo {
        parse_anthropic_error(status, body)
    }

    fn probe(&self) -> ProviderRequest {
        ProviderRequest::get(format!("{}/v1/models", self.base_url), self.signing())
            .with_header("anthropic-version", ANTHROPIC_VERSION.to_string())
    }

    fn base_endpoint(&self) -> String {
        self.base_url.clone()
    }

    fn transport_signing(&self) -> SigningDirective {
        self.signing()
    }
}
