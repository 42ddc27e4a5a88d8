//! Session control surface: login, refresh, logout, session listing.

use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, State},
};
use http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    auth::{AuthError, Principal, SessionRecord, session_token_from_headers},
    error::GatewayError,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub api_key: String,
    #[serde(default)]
    pub totp_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub expires_in: i64,
    pub user: UserSummary,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl LoginResponse {
    fn new(session: &SessionRecord, principal: &Principal, message: &'static str) -> Self {
        Self {
            session_token: session.token.clone(),
            expires_at: session.expires_at,
            expires_in: (session.expires_at - session.created_at).num_seconds(),
            user: UserSummary {
                id: principal.id,
                name: principal.name.clone(),
                email: principal.email.clone(),
            },
            message,
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, GatewayError> {
    let user_agent = headers
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok());

    let (session, principal) = state
        .authenticator
        .login(
            &request.api_key,
            request.totp_code.as_deref(),
            Some(&remote.ip().to_string()),
            user_agent,
        )
        .await?;

    Ok(Json(LoginResponse::new(
        &session,
        &principal,
        "Login successful",
    )))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LoginResponse>, GatewayError> {
    let token = session_token_from_headers(&headers).ok_or(AuthError::UnknownSession)?;
    let (session, principal) = state.authenticator.refresh(&token).await?;
    Ok(Json(LoginResponse::new(
        &session,
        &principal,
        "Session refreshed",
    )))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, GatewayError> {
    let token = session_token_from_headers(&headers).ok_or(AuthError::UnknownSession)?;
    state.authenticator.logout(&token).await?;
    Ok(Json(LogoutResponse {
        message: "Session revoked",
    }))
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessions: Vec<SessionRecord>,
}

/// Active sessions for the presented token's principal. Token strings are
/// never echoed back.
pub async fn sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionList>, GatewayError> {
    let token = session_token_from_headers(&headers).ok_or(AuthError::UnknownSession)?;
    let (_, principal) = state.authenticator.store().verify_session(&token).await
        .map_err(AuthError::from)?;
    let sessions = state
        .authenticator
        .store()
        .list_sessions(principal.id)
        .await
        .map_err(AuthError::from)?;
    Ok(Json(SessionList { sessions }))
}
