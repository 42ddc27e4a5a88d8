//! IBM watsonx.ai adapter.
//!
//! watsonx's text-generation endpoint takes a single prompt string, so the
//! conversation is flattened into role-tagged lines with a trailing
//! `ASSISTANT:` cue. Tool calling has no representation on this wire and is
//! rejected before dispatch.

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    api_types::{ChatCompletion, ChatCompletionRequest, FinishReason, ResponseMessage, TokenUsage},
    config::ProviderSettings,
    providers::{
        AdapterError, ChatAdapter, ProviderRequest, ProviderSecrets, ResolvedTarget,
        SigningDirective, base_url_or, clamp_temperature,
        error::{ProviderErrorInfo, parse_watsonx_error},
        flatten_transcript,
    },
};

const DEFAULT_BASE_URL: &str = "https://us-south.ml.cloud.ibm.com";
const DEFAULT_API_VERSION: &str = "2023-05-29";
const DEFAULT_MAX_NEW_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct WatsonxRequest {
    model_id: String,
    input: String,
    parameters: WatsonxParameters,
    project_id: String,
}

#[derive(Debug, Serialize)]
struct WatsonxParameters {
    max_new_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct WatsonxResponse {
    #[serde(default)]
    results: Vec<WatsonxResult>,
}

#[derive(Debug, Deserialize)]
struct WatsonxResult {
    #[serde(default)]
    generated_text: String,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    input_token_count: Option<u32>,
    #[serde(default)]
    generated_token_count: Option<u32>,
}

pub struct WatsonxAdapter {
    api_key: String,
    project_id: String,
    base_url: String,
    api_version: String,
}

impl WatsonxAdapter {
    pub fn new(settings: &ProviderSettings, secrets: &ProviderSecrets) -> Self {
        Self {
            api_key: secrets.watsonx_api_key.clone().unwrap_or_default(),
            project_id: settings
                .project_id
                .clone()
                .or_else(|| secrets.watsonx_project_id.clone())
                .unwrap_or_default(),
            base_url: base_url_or(settings, DEFAULT_BASE_URL).to_string(),
            api_version: settings
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        }
    }
}

impl ChatAdapter for WatsonxAdapter {
    fn name(&self) -> &'static str {
        "watsonx"
    }

    fn supports_tools(&self) -> bool {
        false
    }

    fn prepare(
        &self,
        target: &ResolvedTarget,
        request: &ChatCompletionRequest,
    ) -> Result<ProviderRequest, AdapterError> {
        if request.has_tools() {
            return Err(AdapterError::ToolsUnsupported);
        }

        let watsonx_request = WatsonxRequest {
            model_id: target.upstream_model.clone(),
            input: flatten_transcript(&request.messages),
            parameters: WatsonxParameters {
                max_new_tokens: match request.max_tokens {
                    Some(0) | None => DEFAULT_MAX_NEW_TOKENS,
                    Some(n) => n,
                },
                temperature: request
                    .temperature
                    .map(|t| clamp_temperature(self.name(), t, 0.0, 2.0)),
                top_p: request.top_p,
                stop_sequences: request.stop.clone().map(|s| s.into_vec()),
            },
            project_id: self.project_id.clone(),
        };

        let api_version = target.api_version.as_deref().unwrap_or(&self.api_version);
        let body = serde_json::to_vec(&watsonx_request)?;
        Ok(ProviderRequest::post_json(
            format!(
                "{}/ml/v1/text/generation?version={}",
                self.base_url, api_version
            ),
            body,
            SigningDirective::Bearer(self.api_key.clone()),
        ))
    }

    fn parse_response(
        &self,
        model: &str,
        _status: StatusCode,
        body: &[u8],
    ) -> Result<ChatCompletion, AdapterError> {
        let response: WatsonxResponse = serde_json::from_slice(body)
            .map_err(|e| AdapterError::UnexpectedResponse(e.to_string()))?;

        let result = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::UnexpectedResponse("empty results".to_string()))?;

        let finish_reason = result.stop_reason.as_deref().map(|reason| match reason {
            "max_tokens" | "token_limit" => FinishReason::Length,
            // eos_token, stop_sequence, anything novel
            _ => FinishReason::Stop,
        });

        Ok(ChatCompletion::single(
            "watsonx",
            model,
            ResponseMessage::assistant(Some(result.generated_text), None),
            finish_reason,
            TokenUsage::from_counts(result.input_token_count, result.generated_token_count),
        ))
    }

    fn parse_error(
        &self,
        status: StatusCode,
        _headers: &HeaderMap,
        body: &[u8],
    ) -> ProviderErrorInfo {
        parse_watsonx_error(status, body)
    }

    fn probe(&self) -> ProviderRequest {
        ProviderRequest::get(
            format!(
                "{}/ml/v1/foundation_model_specs?version={}",
                self.base_url, self.api_version
            ),
            SigningDirective::Bearer(self.api_key.clone()),
        )
    }

    fn base_endpoint(&self) -> String {
        self.base_url.clone()
    }

    fn transport_signing(&self) -> SigningDirective {
        SigningDirective::Bearer(self.api_key.clone())
    }
}
