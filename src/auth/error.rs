//! Authentication fault taxonomy.
//!
//! Auth faults are terminal for the request and never retried.

use http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No credential presented")]
    MissingCredential,

    #[error("Credential does not match any active record")]
    UnknownCredential,

    #[error("Credential has expired")]
    CredentialExpired,

    #[error("Two-factor code required")]
    TwoFactorRequired,

    #[error("Invalid two-factor code")]
    InvalidTwoFactor,

    #[error("Two-factor authentication is not enabled for this principal")]
    TwoFactorDisabled,

    #[error("Session token does not match any active session")]
    UnknownSession,

    #[error("Session has expired")]
    SessionExpired,

    #[error("Credential store failure: {0}")]
    Store(String),
}

impl AuthError {
    /// Stable error `type` string for the wire envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::UnknownCredential => "unknown_credential",
            Self::CredentialExpired => "expired",
            Self::TwoFactorRequired => "twofactor_required",
            Self::InvalidTwoFactor => "invalid_twofactor",
            Self::TwoFactorDisabled => "twofactor_disabled",
            Self::UnknownSession => "unknown_session",
            Self::SessionExpired => "session_expired",
            Self::Store(_) => "internal_fault",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_faults_are_unauthorized() {
        for err in [
            AuthError::MissingCredential,
            AuthError::UnknownCredential,
            AuthError::TwoFactorRequired,
            AuthError::InvalidTwoFactor,
            AuthError::UnknownSession,
            AuthError::SessionExpired,
        ] {
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn store_failures_are_internal() {
        assert_eq!(
            AuthError::Store("io".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AuthError::Store("io".into()).kind(), "internal_fault");
    }
}
