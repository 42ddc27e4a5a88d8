//! Upstream HTTP transport.
//!
//! One `reqwest::Client` per provider, built with that provider's timeout,
//! keep-alive, TLS verification, and at most one redirect hop. The transport
//! applies each request's signing directive at dispatch time and owns the
//! retry policy: transport faults, 429 and 5xx are retried up to the
//! provider's budget; other statuses are returned to the caller untouched.

use std::{collections::HashMap, time::Duration};

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use reqwest::Client;

use crate::{
    config::{ProvidersConfig, RetryPolicy},
    providers::{
        ProviderRequest, SigningDirective,
        aws::{SigV4Signer, SigningError},
    },
};

/// Raw upstream response handed back to the adapter.
#[derive(Debug)]
pub struct ProviderResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Faults raised while dispatching to an upstream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("No transport configured for provider '{0}'")]
    UnknownProvider(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Request signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("Invalid request header: {0}")]
    InvalidHeader(String),
}

impl TransportError {
    /// Transport faults that another attempt might resolve.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Request(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Signing(SigningError::StaleCredentials) => true,
            _ => false,
        }
    }
}

pub struct Transport {
    clients: HashMap<String, Client>,
    retries: HashMap<String, RetryPolicy>,
    sigv4: SigV4Signer,
}

impl Transport {
    /// Build one client per enabled provider.
    pub fn from_config(providers: &ProvidersConfig) -> Result<Self, reqwest::Error> {
        let mut clients = HashMap::new();
        let mut retries = HashMap::new();

        for (name, settings) in providers.iter_enabled() {
            let client = Client::builder()
                .timeout(Duration::from_secs(settings.timeout_secs))
                .tcp_keepalive(Duration::from_secs(60))
                .redirect(reqwest::redirect::Policy::limited(1))
                .build()?;
            clients.insert(name.to_string(), client);
            retries.insert(name.to_string(), settings.retry());
        }

        Ok(Self {
            clients,
            retries,
            sigv4: SigV4Signer::new(),
        })
    }

    /// Dispatch with the provider's configured retry policy.
    pub async fn dispatch(
        &self,
        provider: &str,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, TransportError> {
        let policy = self
            .retries
            .get(provider)
            .copied()
            .ok_or_else(|| TransportError::UnknownProvider(provider.to_string()))?;
        self.dispatch_with_policy(provider, request, policy).await
    }

    /// Dispatch exactly once. Used by health probes, which have their own
    /// failure accounting.
    pub async fn dispatch_once(
        &self,
        provider: &str,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, TransportError> {
        let policy = RetryPolicy {
            max_retries: 0,
            delay_ms: 0,
            backoff: Default::default(),
        };
        self.dispatch_with_policy(provider, request, policy).await
    }

    async fn dispatch_with_policy(
        &self,
        provider: &str,
        request: &ProviderRequest,
        policy: RetryPolicy,
    ) -> Result<ProviderResponse, TransportError> {
        let client = self
            .clients
            .get(provider)
            .ok_or_else(|| TransportError::UnknownProvider(provider.to_string()))?;

        let max_attempts = policy.max_retries + 1;
        let mut attempt = 0;

        loop {
            let result = self.send_once(client, request).await;

            match result {
                Ok(response) => {
                    let status = response.status.as_u16();

                    if expired_aws_credentials(&response) {
                        // Stale SigV4 credentials: refetch and retry, outside
                        // the provider's normal retry budget logic.
                        self.sigv4.invalidate().await;
                        if attempt < max_attempts - 1 {
                            attempt += 1;
                            continue;
                        }
                        return Err(TransportError::Signing(SigningError::StaleCredentials));
                    }

                    if policy.should_retry_status(status) && attempt < max_attempts - 1 {
                        let delay = policy.delay_for_attempt(attempt);
                        tracing::warn!(
                            provider,
                            status,
                            attempt = attempt + 1,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Retryable status from upstream, will retry after delay"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    if attempt > 0 {
                        tracing::debug!(
                            provider,
                            status,
                            attempt = attempt + 1,
                            "Upstream request settled after retry"
                        );
                    }
                    return Ok(response);
                }
                Err(error) => {
                    if error.is_retryable() && attempt < max_attempts - 1 {
                        let delay = policy.delay_for_attempt(attempt);
                        tracing::warn!(
                            provider,
                            error = %error,
                            attempt = attempt + 1,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Retryable transport error, will retry after delay"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    async fn send_once(
        &self,
        client: &Client,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
            headers.insert(HeaderName::from_static(name), value);
        }

        match &request.signing {
            SigningDirective::None => {}
            SigningDirective::Bearer(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|_| TransportError::InvalidHeader("authorization".to_string()))?;
                headers.insert(http::header::AUTHORIZATION, value);
            }
            SigningDirective::ApiKey { header, value } => {
                let value = HeaderValue::from_str(value)
                    .map_err(|_| TransportError::InvalidHeader(header.to_string()))?;
                headers.insert(HeaderName::from_static(header), value);
            }
            SigningDirective::SigV4 { service, region } => {
                let header_pairs: Vec<(&str, &str)> = request
                    .headers
                    .iter()
                    .map(|(n, v)| (*n, v.as_str()))
                    .collect();
                let signed = self
                    .sigv4
                    .sign(
                        region,
                        service,
                        request.method.as_str(),
                        &request.url,
                        &header_pairs,
                        &request.body,
                    )
                    .await?;
                headers.extend(signed);
            }
        }

        let mut builder = client
            .request(request.method.clone(), &request.url)
            .headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Request(e)
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(TransportError::Request)?;

        Ok(ProviderResponse {
            status,
            headers,
            body,
        })
    }
}

/// SigV4 responses rejecting the signature as stale carry an AWS error type
/// naming the expired token.
fn expired_aws_credentials(response: &ProviderResponse) -> bool {
    if response.status != StatusCode::FORBIDDEN {
        return false;
    }
    response
        .headers
        .get("x-amzn-errortype")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|t| t.contains("ExpiredToken"))
}
