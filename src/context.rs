//! Per-request context: correlation id and audit fingerprint.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Context carried through one request's auth → route → traverse pipeline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Stable digest of the request's identifying shape, recorded on every
    /// audit event so one request's traversal attempts correlate.
    pub fingerprint: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl RequestContext {
    /// Build a context for an incoming request, honoring a caller-supplied
    /// correlation id.
    pub fn new(existing_id: Option<&str>, method: &str, path: &str) -> Self {
        let request_id = existing_id
            .filter(|id| !id.is_empty())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let fingerprint = fingerprint(&request_id, method, path);
        Self {
            request_id,
            fingerprint,
            received_at: chrono::Utc::now(),
        }
    }
}

/// First 16 hex chars of SHA-256 over the request's identifying tuple.
fn fingerprint(request_id: &str, method: &str, path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request_id.as_bytes());
    hasher.update(b"|");
    hasher.update(method.as_bytes());
    hasher.update(b"|");
    hasher.update(path.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_supplied_id_is_honored() {
        let ctx = RequestContext::new(Some("req-123"), "POST", "/v1/chat/completions");
        assert_eq!(ctx.request_id, "req-123");
    }

    #[test]
    fn missing_id_generates_one() {
        let ctx = RequestContext::new(None, "POST", "/v1/chat/completions");
        assert!(!ctx.request_id.is_empty());
        let other = RequestContext::new(None, "POST", "/v1/chat/completions");
        assert_ne!(ctx.request_id, other.request_id);
    }

    #[test]
    fn fingerprint_is_stable_for_the_same_tuple() {
        let a = RequestContext::new(Some("x"), "POST", "/v1/chat/completions");
        let b = RequestContext::new(Some("x"), "POST", "/v1/chat/completions");
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 16);

        let c = RequestContext::new(Some("x"), "GET", "/v1/models");
        assert_ne!(a.fingerprint, c.fingerprint);
    }
}
