//! # Provider Adapters
//!
//! One adapter per upstream backend, all implementing the same contract:
//! translate a canonical chat request into the backend's wire request, and
//! translate the backend's response bytes back into the canonical response.
//!
//! Adapters are pure translators. They never perform I/O: the request they
//! produce carries a [`SigningDirective`] that the transport applies at
//! dispatch time. This keeps SigV4 signing (which needs fresh credentials)
//! and retry policy in exactly one place.

pub mod anthropic;
pub mod aws;
pub mod azure_openai;
pub mod bedrock;
pub mod error;
pub mod oracle;
pub mod openai;
pub mod vertex;
pub mod watsonx;

use std::sync::Arc;

use http::{HeaderMap, Method, StatusCode};
use indexmap::IndexMap;

use crate::{
    api_types::{ChatCompletion, ChatCompletionRequest, Message},
    config::{ModelTarget, ProviderSettings, ProvidersConfig},
    providers::error::ProviderErrorInfo,
};

/// How the transport must authenticate an outgoing request.
#[derive(Debug, Clone)]
pub enum SigningDirective {
    /// No request signing.
    None,
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// A named header carrying an API key, e.g. `api-key` or `x-api-key`.
    ApiKey {
        header: &'static str,
        value: String,
    },
    /// AWS SigV4 over the full request, including the payload checksum.
    SigV4 {
        service: &'static str,
        region: String,
    },
}

/// A fully prepared upstream request.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
    pub signing: SigningDirective,
}

impl ProviderRequest {
    /// A POST with a JSON body.
    pub fn post_json(url: String, body: Vec<u8>, signing: SigningDirective) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: vec![("content-type", "application/json".to_string())],
            body,
            signing,
        }
    }

    /// A bodyless GET, used by health probes.
    pub fn get(url: String, signing: SigningDirective) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: Vec::new(),
            signing,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: String) -> Self {
        self.headers.push((name, value));
        self
    }
}

/// Faults raised during translation, before or after the upstream call.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("This provider does not support tool calling")]
    ToolsUnsupported,

    #[error("Failed to encode upstream request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Unexpected upstream response: {0}")]
    UnexpectedResponse(String),
}

/// The adapter contract shared by all seven backends.
///
/// `prepare` and `parse_response` are pure; the only adapters holding any
/// credential state are those whose signing directive embeds a token read
/// once from the environment at startup.
pub trait ChatAdapter: Send + Sync {
    /// Provider name as it appears in routing configuration.
    fn name(&self) -> &'static str;

    /// Whether tool definitions can be forwarded to this backend.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Translate a canonical request into the backend's wire request.
    fn prepare(
        &self,
        target: &ResolvedTarget,
        request: &ChatCompletionRequest,
    ) -> Result<ProviderRequest, AdapterError>;

    /// Translate a successful upstream body into the canonical response.
    ///
    /// `model` is the canonical model name echoed back to the client.
    fn parse_response(
        &self,
        model: &str,
        status: StatusCode,
        body: &[u8],
    ) -> Result<ChatCompletion, AdapterError>;

    /// Extract error details from a failed upstream response.
    fn parse_error(&self, status: StatusCode, headers: &HeaderMap, body: &[u8])
    -> ProviderErrorInfo;

    /// The cheap liveness request issued by the health gate.
    fn probe(&self) -> ProviderRequest;

    /// Base URL this provider's requests are addressed to. Native
    /// passthrough appends its path suffix here.
    fn base_endpoint(&self) -> String;

    /// Signing applied to native passthrough requests.
    fn transport_signing(&self) -> SigningDirective;
}

/// Routing decision handed to an adapter: the upstream model id plus the
/// mapping details the adapter needs to build its path.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTarget {
    pub upstream_model: String,
    pub region: Option<String>,
    pub location: Option<String>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
}

impl ResolvedTarget {
    /// Merge a mapping entry over the requested model name.
    pub fn from_mapping(requested_model: &str, target: Option<&ModelTarget>) -> Self {
        match target {
            Some(t) => Self {
                upstream_model: t
                    .model
                    .clone()
                    .unwrap_or_else(|| requested_model.to_string()),
                region: t.region.clone(),
                location: t.location.clone(),
                deployment: t.deployment.clone(),
                api_version: t.api_version.clone(),
            },
            None => Self {
                upstream_model: requested_model.to_string(),
                ..Default::default()
            },
        }
    }
}

/// Provider secrets and environment defaults, read exactly once at startup.
#[derive(Debug, Clone, Default)]
pub struct ProviderSecrets {
    pub aws_region: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub watsonx_api_key: Option<String>,
    pub watsonx_project_id: Option<String>,
    pub vertex_project_id: Option<String>,
    pub vertex_location: Option<String>,
    pub vertex_access_token: Option<String>,
    pub oci_compartment_id: Option<String>,
    pub oci_auth_token: Option<String>,
    pub oci_endpoint: Option<String>,
}

impl ProviderSecrets {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            aws_region: var("AWS_REGION"),
            azure_endpoint: var("AZURE_OPENAI_ENDPOINT"),
            azure_api_key: var("AZURE_OPENAI_API_KEY"),
            openai_api_key: var("OPENAI_API_KEY"),
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            watsonx_api_key: var("WATSONX_API_KEY"),
            watsonx_project_id: var("WATSONX_PROJECT_ID"),
            vertex_project_id: var("VERTEX_PROJECT_ID"),
            vertex_location: var("VERTEX_LOCATION"),
            vertex_access_token: var("VERTEX_ACCESS_TOKEN"),
            oci_compartment_id: var("OCI_COMPARTMENT_ID"),
            oci_auth_token: var("OCI_AUTH_TOKEN"),
            oci_endpoint: var("OCI_ENDPOINT"),
        }
    }
}

/// The closed set of adapters, keyed by provider name.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: IndexMap<String, Arc<dyn ChatAdapter>>,
}

impl AdapterSet {
    /// Build adapters for every enabled provider in the configuration.
    ///
    /// Unknown provider names are rejected: the set of backends is closed.
    pub fn from_config(
        providers: &ProvidersConfig,
        secrets: &ProviderSecrets,
    ) -> Result<Self, String> {
        let mut adapters: IndexMap<String, Arc<dyn ChatAdapter>> = IndexMap::new();

        for (name, settings) in providers.iter_enabled() {
            let adapter: Arc<dyn ChatAdapter> = match name {
                "openai" => Arc::new(openai::OpenAiAdapter::new(settings, secrets)),
                "azure" => Arc::new(azure_openai::AzureOpenAiAdapter::new(settings, secrets)?),
                "anthropic" => Arc::new(anthropic::AnthropicAdapter::new(settings, secrets)),
                "bedrock" => Arc::new(bedrock::BedrockAdapter::new(settings, secrets)),
                "vertex" => Arc::new(vertex::VertexAdapter::new(settings, secrets)?),
                "watsonx" => Arc::new(watsonx::WatsonxAdapter::new(settings, secrets)),
                "oracle" => Arc::new(oracle::OracleAdapter::new(settings, secrets)),
                other => return Err(format!("unknown provider '{}' in configuration", other)),
            };
            adapters.insert(name.to_string(), adapter);
        }

        Ok(Self { adapters })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ChatAdapter>> {
        self.adapters.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn ChatAdapter>)> {
        self.adapters.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Helper: settings-or-default base URL.
pub(crate) fn base_url_or<'a>(settings: &'a ProviderSettings, default: &'a str) -> &'a str {
    settings.endpoint().unwrap_or(default)
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared message transforms
// ─────────────────────────────────────────────────────────────────────────────

/// Extract all system messages from the list, concatenating their text into a
/// single block (joined by newlines). Returns the block and the remaining
/// non-system messages in order. Used by the Bedrock, Anthropic and Vertex
/// adapters.
pub fn split_system_messages(messages: &[Message]) -> (String, Vec<&Message>) {
    let mut system_parts = Vec::new();
    let mut rest = Vec::new();

    for message in messages {
        match message {
            Message::System { content, .. } => {
                let text = content.text();
                if !text.is_empty() {
                    system_parts.push(text);
                }
            }
            other => rest.push(other),
        }
    }

    (system_parts.join("\n"), rest)
}

/// Flatten a multi-turn conversation into a single prompt string, emitting
/// each message as `"<ROLE>: <content>\n"` and appending the final
/// `"ASSISTANT: "` cue. Used by the watsonx adapter.
pub fn flatten_transcript(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let text = match message {
            Message::System { content, .. }
            | Message::User { content, .. }
            | Message::Tool { content, .. } => content.text(),
            Message::Assistant { content, .. } => {
                content.as_ref().map(|c| c.text()).unwrap_or_default()
            }
        };
        prompt.push_str(&message.role().to_uppercase());
        prompt.push_str(": ");
        prompt.push_str(&text);
        prompt.push('\n');
    }
    prompt.push_str("ASSISTANT: ");
    prompt
}

/// Clamp a sampling temperature to the backend's accepted range, logging when
/// the caller's value had to move.
pub fn clamp_temperature(provider: &str, temperature: f64, min: f64, max: f64) -> f64 {
    let clamped = temperature.clamp(min, max);
    if (clamped - temperature).abs() > f64::EPSILON {
        tracing::warn!(
            provider,
            requested = temperature,
            clamped,
            "Temperature outside the backend's accepted range; clamped"
        );
    }
    clamped
}

/// Normalize a tool call ID for backends that restrict the character set.
///
/// - Removes characters outside `[a-zA-Z0-9_-]`
/// - Truncates to 64 chars
/// - Falls back to a generated ID if the result is empty
pub fn normalize_tool_call_id(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(64)
        .collect();

    if cleaned.is_empty() {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    } else {
        cleaned
    }
}
