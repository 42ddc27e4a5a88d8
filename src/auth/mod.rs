//! Authentication: credential store, second factor, and session tokens.
//!
//! The [`Authenticator`] is a stateless façade over the store. Callers
//! present one of:
//!
//! - `X-Session-Token: <token>` (or `Authorization: Bearer <token>` when the
//!   token carries the session prefix)
//! - `X-API-Key: <credential>` or `Authorization: Bearer <credential>`
//!
//! plus `X-TOTP-Code` when a second factor is in play. Auth faults are
//! terminal for the request and never retried.

mod error;
pub mod keygen;
pub mod store;
pub mod twofactor;

use std::{sync::Arc, time::Duration};

pub use error::AuthError;
use http::HeaderMap;
pub use store::{CredentialStore, Principal, SessionRecord, StoreError, TwoFactorEnrollment};

use self::keygen::SESSION_TOKEN_PREFIX;

/// Credential header.
pub const HEADER_API_KEY: &str = "x-api-key";
/// Session-token header.
pub const HEADER_SESSION_TOKEN: &str = "x-session-token";
/// TOTP or backup-code header.
pub const HEADER_TOTP_CODE: &str = "x-totp-code";

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownCredential | StoreError::UnknownPrincipal => {
                AuthError::UnknownCredential
            }
            StoreError::CredentialExpired => AuthError::CredentialExpired,
            StoreError::UnknownSession => AuthError::UnknownSession,
            StoreError::SessionExpired => AuthError::SessionExpired,
            StoreError::TwoFactorDisabled => AuthError::TwoFactorDisabled,
            StoreError::InvalidTwoFactor => AuthError::InvalidTwoFactor,
            StoreError::Storage(e) => AuthError::Store(e.to_string()),
            StoreError::Hash(e) => AuthError::Store(e.to_string()),
            StoreError::Totp(e) => AuthError::Store(e.to_string()),
            StoreError::Worker(e) => AuthError::Store(e),
        }
    }
}

/// How the caller authenticated, alongside the resolved principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Credential,
    Session,
}

pub struct Authenticator {
    store: Arc<CredentialStore>,
    require_two_factor: bool,
    session_lifetime: Duration,
}

impl Authenticator {
    pub fn new(
        store: Arc<CredentialStore>,
        require_two_factor: bool,
        session_lifetime: Duration,
    ) -> Self {
        Self {
            store,
            require_two_factor,
            session_lifetime,
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn session_lifetime(&self) -> Duration {
        self.session_lifetime
    }

    /// Resolve the caller from request headers.
    ///
    /// A session token wins outright: it already proves a completed login,
    /// second factor included. A direct credential is verified against the
    /// store and, when the deployment demands it, against the principal's
    /// second factor.
    pub async fn authenticate_request(
        &self,
        headers: &HeaderMap,
    ) -> Result<(Principal, AuthMethod), AuthError> {
        if let Some(token) = session_token_from_headers(headers) {
            let (_, principal) = self.store.verify_session(&token).await?;
            return Ok((principal, AuthMethod::Session));
        }

        let Some(credential) = credential_from_headers(headers) else {
            return Err(AuthError::MissingCredential);
        };

        let principal = self.store.verify(&credential).await?;

        if self.require_two_factor && self.store.two_factor_enabled(principal.id).await? {
            let Some(code) = header_value(headers, HEADER_TOTP_CODE) else {
                return Err(AuthError::TwoFactorRequired);
            };
            self.store.verify_two_factor(principal.id, &code).await?;
        }

        Ok((principal, AuthMethod::Credential))
    }

    /// Exchange a credential (plus second factor where enrolled) for a
    /// session token.
    pub async fn login(
        &self,
        credential: &str,
        totp_code: Option<&str>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(SessionRecord, Principal), AuthError> {
        let principal = self.store.verify(credential).await?;

        if self.store.two_factor_enabled(principal.id).await? {
            let Some(code) = totp_code.filter(|c| !c.is_empty()) else {
                return Err(AuthError::TwoFactorRequired);
            };
            self.store.verify_two_factor(principal.id, code).await?;
        }

        let session = self
            .store
            .mint_session(principal.id, self.session_lifetime, ip_address, user_agent)
            .await?;
        Ok((session, principal))
    }

    /// Mint a replacement session and revoke the presented one.
    pub async fn refresh(&self, token: &str) -> Result<(SessionRecord, Principal), AuthError> {
        let (old_session, principal) = self.store.verify_session(token).await?;
        let new_session = self
            .store
            .mint_session(
                principal.id,
                self.session_lifetime,
                old_session.ip_address.as_deref(),
                old_session.user_agent.as_deref(),
            )
            .await?;
        self.store.revoke_session(token).await?;
        Ok((new_session, principal))
    }

    /// Invalidate the presented session token.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let (session, _) = self.store.verify_session(token).await?;
        self.store.revoke_session(&session.token).await?;
        Ok(())
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "authorization")
        .and_then(|v| v.strip_prefix("Bearer ").map(|t| t.trim().to_string()))
        .filter(|t| !t.is_empty())
}

/// A session token from `X-Session-Token`, or a bearer value carrying the
/// session prefix.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = header_value(headers, HEADER_SESSION_TOKEN) {
        return Some(token);
    }
    bearer_token(headers).filter(|t| keygen::has_prefix(t, SESSION_TOKEN_PREFIX))
}

/// A credential from `X-API-Key`, or a bearer value that is not a session
/// token.
pub fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(credential) = header_value(headers, HEADER_API_KEY) {
        return Some(credential);
    }
    bearer_token(headers).filter(|t| !keygen::has_prefix(t, SESSION_TOKEN_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn authenticator(require_two_factor: bool) -> Authenticator {
        let store = Arc::new(CredentialStore::connect_in_memory().await.unwrap());
        Authenticator::new(store, require_two_factor, Duration::from_secs(3600))
    }

    fn headers_with(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, value.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn missing_credential_is_rejected() {
        let auth = authenticator(false).await;
        let err = auth
            .authenticate_request(&HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));
    }

    #[tokio::test]
    async fn api_key_header_authenticates() {
        let auth = authenticator(false).await;
        let (principal, credential) = auth.store().enroll("alice", None, None, None).await.unwrap();

        let headers = headers_with("x-api-key", &credential);
        let (resolved, method) = auth.authenticate_request(&headers).await.unwrap();
        assert_eq!(resolved.id, principal.id);
        assert_eq!(method, AuthMethod::Credential);
    }

    #[tokio::test]
    async fn bearer_credential_authenticates() {
        let auth = authenticator(false).await;
        let (_, credential) = auth.store().enroll("bob", None, None, None).await.unwrap();

        let headers = headers_with("authorization", &format!("Bearer {}", credential));
        auth.authenticate_request(&headers).await.unwrap();
    }

    #[tokio::test]
    async fn login_and_session_reuse() {
        let auth = authenticator(false).await;
        let (principal, credential) = auth.store().enroll("carol", None, None, None).await.unwrap();

        let (session, _) = auth
            .login(&credential, None, Some("203.0.113.7"), Some("test-agent"))
            .await
            .unwrap();

        // Session token via its own header
        let headers = headers_with("x-session-token", &session.token);
        let (resolved, method) = auth.authenticate_request(&headers).await.unwrap();
        assert_eq!(resolved.id, principal.id);
        assert_eq!(method, AuthMethod::Session);

        // Session token via Authorization: Bearer
        let headers = headers_with("authorization", &format!("Bearer {}", session.token));
        let (resolved, method) = auth.authenticate_request(&headers).await.unwrap();
        assert_eq!(resolved.id, principal.id);
        assert_eq!(method, AuthMethod::Session);
    }

    #[tokio::test]
    async fn login_with_two_factor_requires_a_code() {
        let auth = authenticator(false).await;
        let (principal, credential) = auth.store().enroll("dave", None, None, None).await.unwrap();
        let enrollment = auth
            .store()
            .enroll_two_factor(principal.id, "dave", "palisade")
            .await
            .unwrap();

        let err = auth.login(&credential, None, None, None).await.unwrap_err();
        assert!(matches!(err, AuthError::TwoFactorRequired));

        let code = twofactor::current_code(&enrollment.secret_base32);
        auth.login(&credential, Some(&code), None, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn backup_code_login_is_single_use() {
        let auth = authenticator(false).await;
        let (principal, credential) = auth.store().enroll("erin", None, None, None).await.unwrap();
        let enrollment = auth
            .store()
            .enroll_two_factor(principal.id, "erin", "palisade")
            .await
            .unwrap();
        let backup = enrollment.backup_codes[0].clone();

        auth.login(&credential, Some(&backup), None, None)
            .await
            .unwrap();
        let err = auth
            .login(&credential, Some(&backup), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidTwoFactor));
        assert_eq!(
            auth.store()
                .backup_codes_remaining(principal.id)
                .await
                .unwrap(),
            9
        );
    }

    #[tokio::test]
    async fn refresh_revokes_the_old_token() {
        let auth = authenticator(false).await;
        let (_, credential) = auth.store().enroll("frank", None, None, None).await.unwrap();
        let (session, _) = auth.login(&credential, None, None, None).await.unwrap();

        let (new_session, _) = auth.refresh(&session.token).await.unwrap();
        assert_ne!(new_session.token, session.token);

        let err = auth.refresh(&session.token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownSession));
    }

    #[tokio::test]
    async fn required_two_factor_gates_direct_credentials() {
        let auth = authenticator(true).await;
        let (principal, credential) = auth.store().enroll("grace", None, None, None).await.unwrap();
        let enrollment = auth
            .store()
            .enroll_two_factor(principal.id, "grace", "palisade")
            .await
            .unwrap();

        let headers = headers_with("x-api-key", &credential);
        let err = auth.authenticate_request(&headers).await.unwrap_err();
        assert!(matches!(err, AuthError::TwoFactorRequired));

        let mut headers = headers_with("x-api-key", &credential);
        let code = twofactor::current_code(&enrollment.secret_base32);
        headers.insert("x-totp-code", code.parse().unwrap());
        auth.authenticate_request(&headers).await.unwrap();
    }
}
