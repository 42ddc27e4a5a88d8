//! Upstream error translation.
//!
//! Each backend reports failures in its own shape; these parsers extract a
//! message and a provider error code so the gateway can build one consistent
//! error envelope regardless of which backend failed.

use http::{HeaderMap, StatusCode};

/// Error details extracted from a failed upstream response.
#[derive(Debug, Clone)]
pub struct ProviderErrorInfo {
    /// Provider-specific error code, lowercased on the wire.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ProviderErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// OpenAI and Azure OpenAI: `{"error": {"message", "type", "code"}}`.
pub fn parse_openai_error(status: StatusCode, body: &[u8]) -> ProviderErrorInfo {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
    let error = &value["error"];
    let code = error["code"]
        .as_str()
        .or_else(|| error["type"].as_str())
        .unwrap_or("upstream_error");
    let message = error["message"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| format!("Upstream returned HTTP {}", status.as_u16()));
    ProviderErrorInfo::new(code, message)
}

/// Anthropic: `{"type": "error", "error": {"type", "message"}}`.
pub fn parse_anthropic_error(status: StatusCode, body: &[u8]) -> ProviderErrorInfo {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
    let error = &value["error"];
    let code = error["type"].as_str().unwrap_or("api_error");
    let message = error["message"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| format!("Upstream returned HTTP {}", status.as_u16()));
    ProviderErrorInfo::new(code, message)
}

/// Bedrock: error type in the `x-amzn-errortype` header, message in a flat
/// `{"message": "..."}` body.
pub fn parse_bedrock_error(
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> ProviderErrorInfo {
    let code = headers
        .get("x-amzn-errortype")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(':').next().unwrap_or(s))
        .unwrap_or("bedrock_error");

    let value: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
    let message = value["message"]
        .as_str()
        .or_else(|| value["Message"].as_str())
        .map(String::from)
        .unwrap_or_else(|| format!("Upstream returned HTTP {}", status.as_u16()));

    ProviderErrorInfo::new(code, message)
}

/// Vertex: `{"error": {"status": "INVALID_ARGUMENT", "message": "..."}}`.
pub fn parse_vertex_error(status: StatusCode, body: &[u8]) -> ProviderErrorInfo {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
    let error = &value["error"];
    let code = error["status"].as_str().unwrap_or("UNKNOWN");
    let message = error["message"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| format!("Upstream returned HTTP {}", status.as_u16()));
    ProviderErrorInfo::new(code, message)
}

/// watsonx: `{"errors": [{"code", "message"}], "trace": "..."}`.
pub fn parse_watsonx_error(status: StatusCode, body: &[u8]) -> ProviderErrorInfo {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
    let first = &value["errors"][0];
    let code = first["code"].as_str().unwrap_or("watsonx_error");
    let message = first["message"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| format!("Upstream returned HTTP {}", status.as_u16()));
    ProviderErrorInfo::new(code, message)
}

/// Oracle Generative AI: `{"code": "...", "message": "..."}`.
pub fn parse_oracle_error(status: StatusCode, body: &[u8]) -> ProviderErrorInfo {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
    let code = value["code"].as_str().unwrap_or("oracle_error");
    let message = value["message"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| format!("Upstream returned HTTP {}", status.as_u16()));
    ProviderErrorInfo::new(code, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_error_extracts_code_and_message() {
        let body = br#"{"error":{"message":"Invalid model","type":"invalid_request_error","code":"model_not_found"}}"#;
        let info = parse_openai_error(StatusCode::NOT_FOUND, body);
        assert_eq!(info.code, "model_not_found");
        assert_eq!(info.message, "Invalid model");
    }

    #[test]
    fn openai_error_falls_back_to_type() {
        let body = br#"{"error":{"message":"bad","type":"invalid_request_error"}}"#;
        let info = parse_openai_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(info.code, "invalid_request_error");
    }

    #[test]
    fn bedrock_error_reads_amzn_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-amzn-errortype",
            "ValidationException:http://internal".parse().unwrap(),
        );
        let body = br#"{"message":"Malformed input"}"#;
        let info = parse_bedrock_error(StatusCode::BAD_REQUEST, &headers, body);
        assert_eq!(info.code, "ValidationException");
        assert_eq!(info.message, "Malformed input");
    }

    #[test]
    fn anthropic_error_shape() {
        let body =
            br#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let info = parse_anthropic_error(StatusCode::SERVICE_UNAVAILABLE, body);
        assert_eq!(info.code, "overloaded_error");
        assert_eq!(info.message, "Overloaded");
    }

    #[test]
    fn vertex_error_shape() {
        let body = br#"{"error":{"code":400,"status":"INVALID_ARGUMENT","message":"bad field"}}"#;
        let info = parse_vertex_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(info.code, "INVALID_ARGUMENT");
        assert_eq!(info.message, "bad field");
    }

    #[test]
    fn unparseable_body_yields_status_message() {
        let info = parse_openai_error(StatusCode::BAD_GATEWAY, b"<html>oops</html>");
        assert_eq!(info.code, "upstream_error");
        assert!(info.message.contains("502"));
    }
}
