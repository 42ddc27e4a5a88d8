//! OpenAI chat completions adapter.
//!
//! The canonical wire format is OpenAI's, so translation is nearly the
//! identity: the upstream model id is substituted, the temperature is clamped
//! to OpenAI's range, and the response is re-stamped with the canonical model
//! name.

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    api_types::{
        ChatChoice, ChatCompletion, ChatCompletionRequest, FinishReason, ResponseMessage,
        TokenUsage, ToolCall,
    },
    config::ProviderSettings,
    providers::{
        AdapterError, ChatAdapter, ProviderRequest, ProviderSecrets, ResolvedTarget,
        SigningDirective, base_url_or, clamp_temperature,
        error::{ProviderErrorInfo, parse_openai_error},
    },
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiAdapter {
    api_key: String,
    base_url: String,
}

impl OpenAiAdapter {
    pub fn new(settings: &ProviderSettings, secrets: &ProviderSecrets) -> Self {
        Self {
            api_key: secrets.openai_api_key.clone().unwrap_or_default(),
            base_url: base_url_or(settings, DEFAULT_BASE_URL).to_string(),
        }
    }
}

impl ChatAdapter for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn prepare(
        &self,
        target: &ResolvedTarget,
        request: &ChatCompletionRequest,
    ) -> Result<ProviderRequest, AdapterError> {
        let mut upstream = request.clone();
        upstream.model = target.upstream_model.clone();
        upstream.temperature = upstream
            .temperature
            .map(|t| clamp_temperature(self.name(), t, 0.0, 2.0));

        let body = serde_json::to_vec(&upstream)?;
        Ok(ProviderRequest::post_json(
            format!("{}/v1/chat/completions", self.base_url),
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
            format!("{}/v1/models", self.base_url),
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

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI-compatible wire types, shared with the Azure adapter
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct OpenAiWireResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    pub choices: Vec<OpenAiWireChoice>,
    #[serde(default)]
    pub usage: Option<OpenAiWireUsage>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct OpenAiWireChoice {
    #[serde(default)]
    pub index: Option<u32>,
    pub message: OpenAiWireMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct OpenAiWireMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct OpenAiWireUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
}

/// Map an OpenAI finish-reason string onto the canonical set.
pub(crate) fn map_finish_reason(reason: Option<&str>) -> Option<FinishReason> {
    reason.map(|r| match r {
        "length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    })
}

/// Parse an OpenAI-shaped response body, echoing the canonical model name.
pub(crate) fn parse_openai_compatible_response(
    model: &str,
    body: &[u8],
) -> Result<ChatCompletion, AdapterError> {
    let wire: OpenAiWireResponse = serde_json::from_slice(body)
        .map_err(|e| AdapterError::UnexpectedResponse(e.to_string()))?;

    let choices = wire
        .choices
        .into_iter()
        .enumerate()
        .map(|(idx, choice)| ChatChoice {
            index: choice.index.unwrap_or(idx as u32),
            message: ResponseMessage::assistant(
                choice.message.content,
                choice.message.tool_calls.filter(|calls| !calls.is_empty()),
            ),
            finish_reason: map_finish_reason(choice.finish_reason.as_deref()),
        })
        .collect();

    let usage = wire
        .usage
        .map(|u| TokenUsage::from_counts(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    Ok(ChatCompletion {
        id: wire
            .id
            .unwrap_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4())),
        object: "chat.completion".to_string(),
        created: wire.created.unwrap_or_else(|| chrono::Utc::now().timestamp()),
        model: model.to_string(),
        choices,
        usage: Some(usage),
    })
}
