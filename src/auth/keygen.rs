//! Credential and session-token generation.
//!
//! A credential is 32 bytes of cryptographic randomness encoded as lowercase
//! hex behind a fixed prefix; only its bcrypt verifier is stored. Session
//! tokens use URL-safe base64 behind their own prefix so the two are
//! distinguishable on the wire.

use base64::Engine;
use rand::Rng;
use subtle::ConstantTimeEq;

/// Prefix on every plaintext credential.
pub const CREDENTIAL_PREFIX: &str = "bdrk_";

/// Prefix on every session token.
pub const SESSION_TOKEN_PREFIX: &str = "bdrk_sess_";

/// Generate a new plaintext credential: `bdrk_` + 64 lowercase hex chars.
///
/// The plaintext is returned to the caller exactly once; persist only the
/// verifier from [`hash_credential`].
pub fn generate_credential() -> String {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill(&mut random_bytes);
    format!("{}{}", CREDENTIAL_PREFIX, hex::encode(random_bytes))
}

/// Generate a new session token: `bdrk_sess_` + URL-safe base64 (no padding)
/// of 32 random bytes.
pub fn generate_session_token() -> String {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill(&mut random_bytes);
    let random_part = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes);
    format!("{}{}", SESSION_TOKEN_PREFIX, random_part)
}

/// Ten single-use backup codes, each 8 hex chars formatted `XXXX-XXXX`.
pub fn generate_backup_codes() -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..10)
        .map(|_| {
            let mut bytes = [0u8; 4];
            rng.fill(&mut bytes);
            let hex = hex::encode_upper(bytes);
            format!("{}-{}", &hex[..4], &hex[4..])
        })
        .collect()
}

/// Hash a plaintext credential with bcrypt. The salt and cost are embedded in
/// the verifier string.
pub fn hash_credential(plaintext: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)
}

/// Verify a plaintext credential against a stored verifier. bcrypt's verify
/// is constant-time with respect to the stored hash.
pub fn verify_credential(plaintext: &str, verifier: &str) -> bool {
    bcrypt::verify(plaintext, verifier).unwrap_or(false)
}

/// Constant-time prefix check, so credential-shaped and token-shaped inputs
/// can be routed without leaking match length on the way.
pub fn has_prefix(value: &str, expected_prefix: &str) -> bool {
    if value.len() < expected_prefix.len() {
        return false;
    }
    value.as_bytes()[..expected_prefix.len()]
        .ct_eq(expected_prefix.as_bytes())
        .into()
}
