//! Request ID middleware for request correlation.
//!
//! Generates or propagates a unique request ID for each request and stores
//! the per-request [`RequestContext`] as an extension for handlers.

use axum::{extract::Request, middleware::Next, response::Response};
use http::HeaderValue;

use crate::context::{REQUEST_ID_HEADER, RequestContext};

/// Middleware that attaches a [`RequestContext`] to each request.
///
/// If the request already has an `X-Request-Id` header, it is used;
/// otherwise a new UUID is generated. The id is echoed on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let existing = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let context = RequestContext::new(
        existing.as_deref(),
        req.method().as_str(),
        req.uri().path(),
    );
    let request_id = context.request_id.clone();
    req.extensions_mut().insert(context);

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
