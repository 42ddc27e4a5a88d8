//! Native passthrough: forward a request to one provider's base URL with
//! only transport-level signing applied. No canonical translation occurs;
//! this is the escape hatch for provider-specific features.

use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, State},
    response::{IntoResponse, Response},
};
use http::{HeaderMap, header::CONTENT_TYPE};

use crate::{AppState, error::GatewayError, providers::ProviderRequest};

/// Inbound headers forwarded upstream. Everything else (including the
/// caller's gateway credential) stays on this side.
const FORWARDED_HEADERS: &[&str] = &["content-type", "accept", "anthropic-version"];

pub async fn passthrough(
    State(state): State<AppState>,
    Path((name, suffix)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    state.authenticator.authenticate_request(&headers).await?;

    if !state.config.providers.is_enabled(&name) {
        return Err(GatewayError::InvalidRequest(format!(
            "provider '{}' is not enabled",
            name
        )));
    }
    let Some(adapter) = state.adapters.get(&name) else {
        return Err(GatewayError::InvalidRequest(format!(
            "provider '{}' is not enabled",
            name
        )));
    };

    let mut url = format!("{}/{}", adapter.base_endpoint(), suffix);
    if let Some(query) = uri.query() {
        url.push('?');
        url.push_str(query);
    }

    let mut request = ProviderRequest {
        method: http::Method::POST,
        url,
        headers: Vec::new(),
        body: body.to_vec(),
        signing: adapter.transport_signing(),
    };
    for name in FORWARDED_HEADERS.iter().copied() {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            request.headers.push((name, value.to_string()));
        }
    }
    if !request.headers.iter().any(|(n, _)| *n == "content-type") {
        request
            .headers
            .push(("content-type", "application/json".to_string()));
    }

    let response = state
        .transport
        .dispatch(&name, &request)
        .await
        .map_err(|e| GatewayError::UpstreamUnavailable(format!("{}: {}", name, e)))?;

    let content_type = response
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();

    Ok((
        response.status,
        [(CONTENT_TYPE, content_type)],
        response.body,
    )
        .into_response())
}
