//! Gateway fault taxonomy and the OpenAI-style error envelope.
//!
//! Every fault the gateway can surface maps to exactly one HTTP status and an
//! error `type` string carried in the `{ "error": { ... } }` response body.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{auth::AuthError, observability::metrics};

/// Upstream error messages forwarded to clients are capped at 4 KiB.
const MAX_UPSTREAM_MESSAGE_BYTES: usize = 4096;

/// Faults surfaced on the gateway's own wire.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Conversation has no messages")]
    EmptyConversation,

    #[error("Conversation must not end with an assistant message")]
    TrailingAssistant,

    #[error("Provider '{0}' does not support tool calling")]
    ToolsUnsupported(String),

    #[error("Streaming responses are not implemented")]
    StreamingNotImplemented,

    #[error("No provider mapping for model '{0}'")]
    UnknownModel(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Rate limit exceeded for this principal")]
    RateLimited,

    #[error("{message}")]
    Upstream {
        status: StatusCode,
        error_type: String,
        code: String,
        message: String,
    },

    #[error("All candidate providers failed: {0}")]
    UpstreamUnavailable(String),

    #[error("Provider '{provider}' exceeded its configured timeout")]
    TransportTimeout { provider: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable error `type` string for the wire envelope.
    pub fn kind(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::EmptyConversation => "empty_conversation",
            Self::TrailingAssistant => "trailing_assistant",
            Self::ToolsUnsupported(_) => "tools_unsupported",
            Self::StreamingNotImplemented => "streaming_not_implemented",
            Self::UnknownModel(_) => "unknown_model",
            Self::Auth(e) => e.kind(),
            Self::RateLimited => "rate_limited",
            Self::Upstream { error_type, .. } => error_type,
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::TransportTimeout { .. } => "transport_timeout",
            Self::Internal(_) => "internal_fault",
        }
    }

    /// HTTP status for this fault.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::EmptyConversation
            | Self::TrailingAssistant
            | Self::ToolsUnsupported(_)
            | Self::StreamingNotImplemented => StatusCode::BAD_REQUEST,
            Self::UnknownModel(_) => StatusCode::NOT_FOUND,
            Self::Auth(e) => e.status(),
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream { status, .. } => *status,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::TransportTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build an upstream fault from a non-retryable backend response.
    ///
    /// Provider messages are forwarded verbatim only below 500 and truncated;
    /// server-side messages are replaced so backend internals never leak.
    pub fn upstream(status: StatusCode, code: impl Into<String>, message: String) -> Self {
        let message = if status.as_u16() < 500 {
            truncate_message(message)
        } else {
            "Upstream provider error".to_string()
        };
        Self::Upstream {
            status,
            error_type: format!("upstream_4xx_{}", status.as_u16()),
            code: code.into(),
            message,
        }
    }
}

fn truncate_message(message: String) -> String {
    if message.len() <= MAX_UPSTREAM_MESSAGE_BYTES {
        return message;
    }
    let mut end = MAX_UPSTREAM_MESSAGE_BYTES;
    while !message.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    message[..end].to_string()
}

/// Error envelope body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind().to_string();
        metrics::record_gateway_error(&kind, status.as_u16());

        let code = match &self {
            Self::Upstream { code, .. } => Some(code.clone()),
            _ => None,
        };
        let body = ErrorEnvelope {
            error: ErrorBody {
                message: self.to_string(),
                error_type: kind,
                param: None,
                code,
            },
        };
        (status, Json(body)).into_response()
    }
}
