//! AWS Bedrock adapter, speaking the Converse API.
//!
//! Requests are signed with SigV4 by the transport; this adapter only marks
//! them with the `bedrock` service and the resolved region.

mod convert;
mod types;

use convert::{convert_messages, convert_response, convert_tool_choice, convert_tools};
use http::{HeaderMap, StatusCode};
use types::{BedrockConverseRequest, BedrockConverseResponse, BedrockInferenceConfig, BedrockToolConfig};

use crate::{
    api_types::{ChatCompletion, ChatCompletionRequest},
    config::ProviderSettings,
    providers::{
        AdapterError, ChatAdapter, ProviderRequest, ProviderSecrets, ResolvedTarget,
        SigningDirective, clamp_temperature,
        error::{ProviderErrorInfo, parse_bedrock_error},
    },
};

/// Default max tokens when the caller omits one; Converse rejects absent limits
/// for Anthropic-family models.
const DEFAULT_MAX_TOKENS: u32 = 4096;

const DEFAULT_REGION: &str = "us-east-1";

pub struct BedrockAdapter {
    region: String,
    /// Runtime endpoint override, mainly for tests and private VPC endpoints.
    endpoint_override: Option<String>,
}

impl BedrockAdapter {
    pub fn new(settings: &ProviderSettings, secrets: &ProviderSecrets) -> Self {
        Self {
            region: settings
                .region
                .clone()
                .or_else(|| secrets.aws_region.clone())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint_override: settings.endpoint().map(str::to_string),
        }
    }

    fn runtime_url(&self, region: &str) -> String {
        match &self.endpoint_override {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", region),
        }
    }

    fn control_url(&self, region: &str) -> String {
        match &self.endpoint_override {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://bedrock.{}.amazonaws.com", region),
        }
    }
}

impl ChatAdapter for BedrockAdapter {
    fn name(&self) -> &'static str {
        "bedrock"
    }

    fn prepare(
        &self,
        target: &ResolvedTarget,
        request: &ChatCompletionRequest,
    ) -> Result<ProviderRequest, AdapterError> {
        let region = target.region.as_deref().unwrap_or(&self.region);
        let (system, messages) = convert_messages(&request.messages);

        let tools = convert_tools(request.tools.as_deref());
        let tool_config = tools.map(|tools| BedrockToolConfig {
            tools,
            tool_choice: convert_tool_choice(request.tool_choice.as_ref()),
        });

        let converse_request = BedrockConverseRequest {
            messages,
            system,
            inference_config: Some(BedrockInferenceConfig {
                max_tokens: Some(match request.max_tokens {
                    Some(0) | None => DEFAULT_MAX_TOKENS,
                    Some(n) => n,
                }),
                temperature: request
                    .temperature
                    .map(|t| clamp_temperature(self.name(), t, 0.0, 1.0)),
                top_p: request.top_p,
                stop_sequences: request.stop.clone().map(|s| s.into_vec()),
            }),
            tool_config,
        };

        let body = serde_json::to_vec(&converse_request)?;
        Ok(ProviderRequest::post_json(
            format!(
                "{}/model/{}/converse",
                self.runtime_url(region),
                target.upstream_model
            ),
            body,
            SigningDirective::SigV4 {
                service: "bedrock",
                region: region.to_string(),
            },
        ))
    }

    fn parse_response(
        &self,
        model: &str,
        _status: StatusCode,
        body: &[u8],
    ) -> Result<ChatCompletion, AdapterError> {
        let response: BedrockConverseResponse = serde_json::from_slice(body)
            .map_err(|e| AdapterError::UnexpectedResponse(e.to_string()))?;
        Ok(convert_response(response, model))
    }

    fn parse_error(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
        body: &[u8],
    ) -> ProviderErrorInfo {
        parse_bedrock_error(status, headers, body)
    }

    fn probe(&self) -> ProviderRequest {
        ProviderRequest::get(
            format!("{}/foundation-models", self.control_url(&self.region)),
            SigningDirective::SigV4 {
                service: "bedrock",
                region: self.region.clone(),
            },
        )
    }

    fn base_endpoint(&self) -> String {
        self.runtime_url(&self.region)
    }

    fn transport_signing(&self) -> SigningDirective {
        SigningDirective::SigV4 {
            service: "bedrock",
            region: self.region.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::{
        Message, MessageContent, ToolDefinition, ToolDefinitionFunction, ToolType,
    };

    fn adapter() -> BedrockAdapter {
        BedrockAdapter {
            region: "us-east-1".to_string(),
            endpoint_override: None,
        }
    }

    fn weather_request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "claude-3-sonnet".to_string(),
            messages: vec![Message::User {
                content: MessageContent::Text("What is the weather in SF?".to_string()),
                name: None,
            }],
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop: None,
            tools: Some(vec![ToolDefinition {
                type_: ToolType::Function,
                function: ToolDefinitionFunction {
                    name: "get_weather".to_string(),
                    description: None,
                    parameters: Some(serde_json::json!({
                        "type": "object",
                        "properties": {"location": {"type": "string"}},
                        "required": ["location"]
                    })),
                },
            }]),
            tool_choice: None,
            response_format: None,
            stream: false,
            user: None,
        }
    }

    #[test]
    fn prepare_builds_converse_path_with_sigv4() {
        let mapping = crate::config::ModelTarget {
            model: Some("anthropic.claude-3-sonnet-20240229-v1:0".to_string()),
            ..Default::default()
        };
        let target = ResolvedTarget::from_mapping("claude-3-sonnet", Some(&mapping));
        let prepared = adapter().prepare(&target, &weather_request()).unwrap();

        assert_eq!(
            prepared.url,
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-3-sonnet-20240229-v1:0/converse"
        );
        assert!(matches!(
            prepared.signing,
            SigningDirective::SigV4 { service: "bedrock", ref region } if region == "us-east-1"
        ));
    }

    #[test]
    fn tools_land_under_tool_spec_and_max_tokens_defaults() {
        let target = ResolvedTarget::from_mapping("claude-3-sonnet", None);
        let prepared = adapter().prepare(&target, &weather_request()).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&prepared.body).unwrap();

        assert_eq!(
            body["toolConfig"]["tools"][0]["toolSpec"]["name"],
            "get_weather"
        );
        assert_eq!(
            body["toolConfig"]["tools"][0]["toolSpec"]["inputSchema"]["json"]["required"][0],
            "location"
        );
        assert_eq!(body["inferenceConfig"]["maxTokens"], 4096);
    }

    #[test]
    fn mapping_region_overrides_default() {
        let mapping = crate::config::ModelTarget {
            region: Some("eu-west-1".to_string()),
            ..Default::default()
        };
        let target = ResolvedTarget::from_mapping("claude-3-sonnet", Some(&mapping));
        let prepared = adapter().prepare(&target, &weather_request()).unwrap();
        assert!(prepared.url.starts_with("https://bedrock-runtime.eu-west-1"));
        assert!(matches!(
            prepared.signing,
            SigningDirective::SigV4 { ref region, .. } if region == "eu-west-1"
        ));
    }

    #[test]
    fn tool_use_response_round_trips() {
        let body = serde_json::json!({
            "output": {"message": {"role": "assistant", "content": [
                {"toolUse": {"toolUseId": "t1", "name": "get_weather",
                 "input": {"location": "San Francisco"}}}
            ]}},
            "stopReason": "tool_use",
            "usage": {"inputTokens": 30, "outputTokens": 10, "totalTokens": 40}
        });
        let completion = adapter()
            .parse_response(
                "claude-3-sonnet",
                StatusCode::OK,
                &serde_json::to_vec(&body).unwrap(),
            )
            .unwrap();
        let calls = completion.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(
            completion.choices[0].finish_reason,
            Some(crate::api_types::FinishReason::ToolCalls)
        );
    }

    #[test]
    fn probe_targets_the_control_plane() {
        let probe = adapter().probe();
        assert_eq!(
            probe.url,
            "https://bedrock.us-east-1.amazonaws.com/foundation-models"
        );
        assert_eq!(probe.method, http::Method::GET);
    }
}
