//! Oracle Generative AI adapter.
//!
//! Oracle's chat action wants uppercase role names and carries the
//! compartment id inside the request body. Tool calling has no representation
//! on this wire and is rejected before dispatch.

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    api_types::{
        ChatCompletion, ChatCompletionRequest, FinishReason, Message, ResponseMessage, TokenUsage,
    },
    config::ProviderSettings,
    providers::{
        AdapterError, ChatAdapter, ProviderRequest, ProviderSecrets, ResolvedTarget,
        SigningDirective, clamp_temperature,
        error::{ProviderErrorInfo, parse_oracle_error},
    },
};

const DEFAULT_BASE_URL: &str = "https://inference.generativeai.us-chicago-1.oci.oraclecloud.com";
const API_DATE: &str = "20231130";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OracleChatEnvelope {
    compartment_id: String,
    serving_mode: OracleServingMode,
    chat_request: OracleChatRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OracleServingMode {
    serving_type: &'static str,
    model_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OracleChatRequest {
    api_format: &'static str,
    messages: Vec<OracleMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

#[derive(Debug, Serialize)]
struct OracleMessage {
    role: String,
    content: Vec<OracleContent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OracleContent {
    #[serde(rename = "type")]
    type_: &'static str,
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OracleChatResponseEnvelope {
    chat_response: OracleChatResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OracleChatResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

pub struct OracleAdapter {
    auth_token: String,
    compartment_id: String,
    base_url: String,
}

impl OracleAdapter {
    pub fn new(settings: &ProviderSettings, secrets: &ProviderSecrets) -> Self {
        let base_url = settings
            .endpoint()
            .map(str::to_string)
            .or_else(|| secrets.oci_endpoint.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            auth_token: secrets.oci_auth_token.clone().unwrap_or_default(),
            compartment_id: secrets.oci_compartment_id.clone().unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Canonical role → Oracle's uppercase vocabulary.
    fn oracle_role(message: &Message) -> String {
        message.role().to_uppercase()
    }
}

impl ChatAdapter for OracleAdapter {
    fn name(&self) -> &'static str {
        "oracle"
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

        let messages = request
            .messages
            .iter()
            .map(|message| {
                let text = match message {
                    Message::System { content, .. }
                    | Message::User { content, .. }
                    | Message::Tool { content, .. } => content.text(),
                    Message::Assistant { content, .. } => {
                        content.as_ref().map(|c| c.text()).unwrap_or_default()
                    }
                };
                OracleMessage {
                    role: Self::oracle_role(message),
                    content: vec![OracleContent {
                        type_: "TEXT",
                        text,
                    }],
                }
            })
            .collect();

        let envelope = OracleChatEnvelope {
            compartment_id: self.compartment_id.clone(),
            serving_mode: OracleServingMode {
                serving_type: "ON_DEMAND",
                model_id: target.upstream_model.clone(),
            },
            chat_request: OracleChatRequest {
                api_format: "GENERIC",
                messages,
                max_tokens: request.max_tokens.filter(|&n| n > 0),
                temperature: request
                    .temperature
                    .map(|t| clamp_temperature(self.name(), t, 0.0, 2.0)),
                top_p: request.top_p,
            },
        };

        let body = serde_json::to_vec(&envelope)?;
        Ok(ProviderRequest::post_json(
            format!("{}/{}/actions/chat", self.base_url, API_DATE),
            body,
            SigningDirective::Bearer(self.auth_token.clone()),
        ))
    }

    fn parse_response(
        &self,
        model: &str,
        _status: StatusCode,
        body: &[u8],
    ) -> Result<ChatCompletion, AdapterError> {
        let envelope: OracleChatResponseEnvelope = serde_json::from_slice(body)
            .map_err(|e| AdapterError::UnexpectedResponse(e.to_string()))?;

        let finish_reason = envelope
            .chat_response
            .finish_reason
            .as_deref()
            .map(|reason| match reason.to_ascii_uppercase().as_str() {
                "LENGTH" | "MAX_TOKENS" => FinishReason::Length,
                _ => FinishReason::Stop,
            });

        Ok(ChatCompletion::single(
            "oracle",
            model,
            ResponseMessage::assistant(envelope.chat_response.text, None),
            finish_reason,
            TokenUsage::from_counts(None, None),
        ))
    }

    fn parse_error(
        &self,
        status: StatusCode,
        _headers: &HeaderMap,
        body: &[u8],
    ) -> ProviderErrorInfo {
        parse_oracle_error(status, body)
    }

    fn probe(&self) -> ProviderRequest {
        ProviderRequest::get(
            format!(
                "{}/{}/models?compartmentId={}",
                self.base_url, API_DATE, self.compartment_id
            ),
            SigningDirective::Bearer(self.auth_token.clone()),
        )
    }

    fn base_endpoint(&self) -> String {
        self.base_url.clone()
    }

    fn transport_signing(&self) -> SigningDirective {
        SigningDirective::Bearer(self.auth_token.clone())
    }
}
