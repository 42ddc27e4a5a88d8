//! TOTP second factor (RFC 6238: SHA-1, 6 digits, 30-second period).

use totp_rs::{Algorithm, Secret, TOTP};

/// Accept the previous and next period alongside the current one.
const SKEW: u8 = 1;
const DIGITS: usize = 6;
const STEP_SECS: u64 = 30;

/// Outcome of second-factor enrollment: the shared secret (base32) and the
/// otpauth provisioning URI for authenticator apps.
pub struct TotpEnrollment {
    pub secret_base32: String,
    pub provisioning_uri: String,
}

/// Errors from TOTP operations; all indicate a corrupted or malformed secret.
#[derive(Debug, thiserror::Error)]
#[error("Invalid TOTP secret: {0}")]
pub struct TotpError(String);

fn build_totp(secret_bytes: Vec<u8>, issuer: &str, account_name: &str) -> Result<TOTP, TotpError> {
    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        SKEW,
        STEP_SECS,
        secret_bytes,
        Some(issuer.to_string()),
        account_name.to_string(),
    )
    .map_err(|e| TotpError(format!("{:?}", e)))
}

/// Generate a fresh 20-byte secret and the provisioning URI for it.
pub fn enroll(issuer: &str, account_name: &str) -> Result<TotpEnrollment, TotpError> {
    let secret = Secret::generate_secret();
    let secret_bytes = secret.to_bytes().map_err(|e| TotpError(format!("{:?}", e)))?;
    let totp = build_totp(secret_bytes, issuer, account_name)?;

    Ok(TotpEnrollment {
        secret_base32: secret.to_encoded().to_string(),
        provisioning_uri: totp.get_url(),
    })
}

/// Verify a 6-digit code against a stored base32 secret, with a ±1 period
/// window.
pub fn verify_code(secret_base32: &str, code: &str) -> Result<bool, TotpError> {
    let secret_bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|e| TotpError(format!("{:?}", e)))?;
    let totp = build_totp(secret_bytes, "palisade", "")?;
    totp.check_current(code)
        .map_err(|e| TotpError(e.to_string()))
}

/// Current code for a secret. Test-side helper for exercising the verify
/// path without freezing time.
#[cfg(test)]
pub fn current_code(secret_base32: &str) -> String {
    let secret_bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .unwrap();
    let totp = build_totp(secret_bytes, "palisade", "").unwrap();
    totp.generate_current().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_produces_base32_secret_and_uri() {
        let enrollment = enroll("palisade", "alice@example.com").unwrap();
        assert!(!enrollment.secret_base32.is_empty());
        assert!(
            enrollment
                .secret_base32
                .chars()
                .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c))
        );
        assert!(enrollment.provisioning_uri.starts_with("otpauth://totp/"));
        assert!(enrollment.provisioning_uri.contains("palisade"));
    }

    #[test]
    fn current_code_verifies() {
        let enrollment = enroll("palisade", "alice").unwrap();
        let code = current_code(&enrollment.secret_base32);
        assert!(verify_code(&enrollment.secret_base32, &code).unwrap());
    }

    #[test]
    fn wrong_code_fails() {
        let enrollment = enroll("palisade", "alice").unwrap();
        let code = current_code(&enrollment.secret_base32);
        // flip a digit
        let wrong: String = code
            .chars()
            .map(|c| if c == '0' { '1' } else { '0' })
            .collect();
        assert!(!verify_code(&enrollment.secret_base32, &wrong).unwrap());
    }

    #[test]
    fn garbage_secret_is_an_error() {
        assert!(verify_code("not-base32-!!!", "000000").is_err());
    }
}
