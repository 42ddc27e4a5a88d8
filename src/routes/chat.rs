//! Chat completions: the gateway's core request loop.
//!
//! authenticate → validate → resolve → traverse. The traversal is strictly
//! sequential over the router's candidate list; there is no speculative
//! dispatch. Retryable upstream outcomes advance to the next candidate,
//! terminal ones return immediately, and a caller-pinned provider never
//! falls back.

use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use http::HeaderMap;
use validator::Validate;

use crate::{
    AppState,
    api_types::{ChatCompletionRequest, Message},
    context::RequestContext,
    error::GatewayError,
    observability::metrics,
    providers::AdapterError,
    router::RouterError,
    transport::TransportError,
};

/// Provider override header.
pub const HEADER_PROVIDER: &str = "x-provider";

pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    Json(payload): Json<ChatCompletionRequest>,
) -> Result<Response, GatewayError> {
    let (principal, _) = match state.authenticator.authenticate_request(&headers).await {
        Ok(resolved) => {
            metrics::record_auth("success");
            resolved
        }
        Err(e) => {
            metrics::record_auth(e.kind());
            return Err(e.into());
        }
    };

    if !state.rate_limiter.check(principal.id) {
        return Err(GatewayError::RateLimited);
    }

    validate_request(&payload)?;

    let preferred = headers
        .get(HEADER_PROVIDER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut candidates = state
        .model_router
        .resolve(&payload.model, preferred)
        .map_err(|RouterError::UnknownModel(model)| GatewayError::UnknownModel(model))?;
    let pinned =
        matches!(preferred, Some(p) if candidates.len() == 1 && candidates[0] == p);
    candidates.truncate(state.model_router.max_attempts());

    tracing::debug!(
        request_id = %ctx.request_id,
        model = %payload.model,
        principal = principal.id,
        candidates = ?candidates,
        pinned,
        "Resolved provider traversal order"
    );

    let mut last_fault: Option<GatewayError> = None;

    for provider in &candidates {
        let Some(adapter) = state.adapters.get(provider) else {
            // Routed to a provider that failed adapter construction; only
            // reachable when configuration and environment disagree.
            last_fault = Some(GatewayError::Internal(format!(
                "no adapter for provider '{}'",
                provider
            )));
            continue;
        };

        if payload.has_tools() && !adapter.supports_tools() {
            let fault = GatewayError::ToolsUnsupported(provider.clone());
            audit(&ctx, provider, &payload.model, "tools_unsupported", None, 0);
            if pinned {
                return Err(fault);
            }
            last_fault = Some(fault);
            continue;
        }

        let target = state.model_router.target(provider, &payload.model);
        let prepared = match adapter.prepare(&target, &payload) {
            Ok(prepared) => prepared,
            Err(AdapterError::ToolsUnsupported) => {
                let fault = GatewayError::ToolsUnsupported(provider.clone());
                if pinned {
                    return Err(fault);
                }
                last_fault = Some(fault);
                continue;
            }
            Err(e) => {
                let fault = GatewayError::Internal(e.to_string());
                if pinned {
                    return Err(fault);
                }
                last_fault = Some(fault);
                continue;
            }
        };

        let start = std::time::Instant::now();
        let response = match state.transport.dispatch(provider, &prepared).await {
            Ok(response) => response,
            Err(e) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                audit(&ctx, provider, &payload.model, "transport_fault", None, latency_ms);
                let fault = match e {
                    TransportError::Timeout => GatewayError::TransportTimeout {
                        provider: provider.clone(),
                    },
                    other => GatewayError::UpstreamUnavailable(format!(
                        "{}: {}",
                        provider, other
                    )),
                };
                if pinned {
                    return Err(fault);
                }
                last_fault = Some(fault);
                continue;
            }
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status;
        metrics::record_upstream_request(provider, &payload.model, status.as_u16(), latency_ms);

        if status.is_success() {
            match adapter.parse_response(&payload.model, status, &response.body) {
                Ok(completion) => {
                    audit(
                        &ctx,
                        provider,
                        &payload.model,
                        "success",
                        Some(status.as_u16()),
                        latency_ms,
                    );
                    if let Some(usage) = &completion.usage {
                        metrics::record_token_usage(
                            provider,
                            &payload.model,
                            usage.prompt_tokens,
                            usage.completion_tokens,
                        );
                    }
                    return Ok(Json(completion).into_response());
                }
                Err(e) => {
                    audit(
                        &ctx,
                        provider,
                        &payload.model,
                        "bad_upstream_body",
                        Some(status.as_u16()),
                        latency_ms,
                    );
                    let fault = GatewayError::Internal(e.to_string());
                    if pinned {
                        return Err(fault);
                    }
                    last_fault = Some(fault);
                    continue;
                }
            }
        }

        // Non-2xx after the transport's own retries.
        let info = adapter.parse_error(status, &response.headers, &response.body);
        let retryable = status.as_u16() == 429 || status.is_server_error();
        audit(
            &ctx,
            provider,
            &payload.model,
            if retryable { "upstream_retryable" } else { "upstream_terminal" },
            Some(status.as_u16()),
            latency_ms,
        );

        let fault = if retryable {
            GatewayError::UpstreamUnavailable(format!(
                "{}: HTTP {} ({})",
                provider,
                status.as_u16(),
                info.message
            ))
        } else {
            GatewayError::upstream(status, info.code, info.message)
        };

        // A definitive 4xx ends the request when the caller pinned the
        // provider; on implicit fallback the same canonical request may
        // still be valid on another backend, so traversal advances.
        if pinned {
            return Err(fault);
        }
        last_fault = Some(fault);
    }

    let detail = last_fault
        .map(|fault| fault.to_string())
        .unwrap_or_else(|| "no candidate providers".to_string());
    Err(GatewayError::UpstreamUnavailable(detail))
}

/// Provider-independent request checks, run before any routing decision.
fn validate_request(payload: &ChatCompletionRequest) -> Result<(), GatewayError> {
    payload
        .validate()
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

    if payload.stream {
        return Err(GatewayError::StreamingNotImplemented);
    }
    if payload.messages.is_empty() {
        return Err(GatewayError::EmptyConversation);
    }
    if matches!(payload.messages.last(), Some(Message::Assistant { .. })) {
        return Err(GatewayError::TrailingAssistant);
    }
    Ok(())
}

/// One audit row per traversal attempt.
fn audit(
    ctx: &RequestContext,
    provider: &str,
    model: &str,
    outcome: &str,
    status: Option<u16>,
    latency_ms: u64,
) {
    tracing::info!(
        request_id = %ctx.request_id,
        fingerprint = %ctx.fingerprint,
        provider,
        model,
        outcome,
        status,
        latency_ms,
        "upstream attempt"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::MessageContent;

    fn base_request() -> ChatCompletionRequest {
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
    fn empty_conversation_is_rejected() {
        let mut request = base_request();
        request.messages.clear();
        assert!(matches!(
            validate_request(&request),
            Err(GatewayError::EmptyConversation)
        ));
    }

    #[test]
    fn trailing_assistant_is_rejected() {
        let mut request = base_request();
        request.messages.push(Message::Assistant {
            content: Some(MessageContent::Text("hello".to_string())),
            name: None,
            tool_calls: None,
        });
        assert!(matches!(
            validate_request(&request),
            Err(GatewayError::TrailingAssistant)
        ));
    }

    #[test]
    fn stream_flag_is_rejected() {
        let mut request = base_request();
        request.stream = true;
        assert!(matches!(
            validate_request(&request),
            Err(GatewayError::StreamingNotImplemented)
        ));
    }

    #[test]
    fn tool_terminated_conversation_is_valid() {
        let mut request = base_request();
        request.messages.push(Message::Tool {
            content: MessageContent::Text("result".to_string()),
            tool_call_id: "call_1".to_string(),
        });
        assert!(validate_request(&request).is_ok());
    }
}
