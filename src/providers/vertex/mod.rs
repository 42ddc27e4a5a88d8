//! Google Vertex AI adapter for Gemini publisher models.

mod convert;
mod types;

use convert::{convert_messages, convert_response, convert_tools, system_instruction};
use http::{HeaderMap, StatusCode};
use types::{VertexGenerateContentRequest, VertexGenerateContentResponse, VertexGenerationConfig};

use crate::{
    api_types::{ChatCompletion, ChatCompletionRequest},
    config::ProviderSettings,
    providers::{
        AdapterError, ChatAdapter, ProviderRequest, ProviderSecrets, ResolvedTarget,
        SigningDirective, clamp_temperature,
        error::{ProviderErrorInfo, parse_vertex_error},
        split_system_messages,
    },
};

pub struct VertexAdapter {
    project: String,
    location: String,
    access_token: String,
    base_url_override: Option<String>,
}

impl VertexAdapter {
    pub fn new(settings: &ProviderSettings, secrets: &ProviderSecrets) -> Result<Self, String> {
        let project = settings
            .project_id
            .clone()
            .or_else(|| secrets.vertex_project_id.clone())
            .ok_or_else(|| {
                "vertex provider requires a project id (config or VERTEX_PROJECT_ID)".to_string()
            })?;
        let location = settings
            .region
            .clone()
            .or_else(|| secrets.vertex_location.clone())
            .unwrap_or_else(|| "us-central1".to_string());

        Ok(Self {
            project,
            location,
            access_token: secrets.vertex_access_token.clone().unwrap_or_default(),
            base_url_override: settings.endpoint().map(str::to_string),
        })
    }

    fn base_url(&self, location: &str) -> String {
        match &self.base_url_override {
            Some(url) => url.clone(),
            None => format!("https://{}-aiplatform.googleapis.com", location),
        }
    }
}

impl ChatAdapter for VertexAdapter {
    fn name(&self) -> &'static str {
        "vertex"
    }

    fn prepare(
        &self,
        target: &ResolvedTarget,
        request: &ChatCompletionRequest,
    ) -> Result<ProviderRequest, AdapterError> {
        let location = target.location.as_deref().unwrap_or(&self.location);
        let (system, rest) = split_system_messages(&request.messages);

        let vertex_request = VertexGenerateContentRequest {
            contents: convert_messages(&rest),
            system_instruction: system_instruction(&system),
            generation_config: Some(VertexGenerationConfig {
                temperature: request
                    .temperature
                    .map(|t| clamp_temperature(self.name(), t, 0.0, 2.0)),
                top_p: request.top_p,
                max_output_tokens: request.max_tokens.filter(|&n| n > 0),
                stop_sequences: request.stop.clone().map(|s| s.into_vec()),
            }),
            tools: convert_tools(request.tools.as_deref()),
        };

        let body = serde_json::to_vec(&vertex_request)?;
        Ok(ProviderRequest::post_json(
            format!(
                "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
                self.base_url(location),
                self.project,
                location,
                target.upstream_model
            ),
            body,
            SigningDirective::Bearer(self.access_token.clone()),
        ))
    }

    fn parse_response(
        &self,
        model: &str,
        _status: StatusCode,
        body: &[u8],
    ) -> Result<ChatCompletion, AdapterError> {
        let response: VertexGenerateContentResponse = serde_json::from_slice(body)
            .map_err(|e| AdapterError::UnexpectedResponse(e.to_string()))?;
        Ok(convert_response(response, model))
    }

    fn parse_error(
        &self,
        status: StatusCode,
        _headers: &HeaderMap,
        body: &[u8],
    ) -> ProviderErrorInfo {
        parse_vertex_error(status, body)
    }

    fn probe(&self) -> ProviderRequest {
        ProviderRequest::get(
            format!(
                "{}/v1/projects/{}/locations/{}/publishers/google/models",
                self.base_url(&self.location),
                self.project,
                self.location
            ),
            SigningDirective::Bearer(self.access_token.clone()),
        )
    }

    fn base_endpoint(&self) -> String {
        self.base_url(&self.location)
    }

    fn transport_signing(&self) -> SigningDirective {
        SigningDirective::Bearer(self.access_token.clone())
    }
}
