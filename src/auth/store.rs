//! The credential store: principals with their credential verifiers, second
//! factors, and session tokens, persisted in sqlite.
//!
//! The store never holds plaintext credentials or TOTP codes: only the bcrypt
//! verifier, the TOTP shared secret, and single-use backup codes.

use std::{str::FromStr, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tokio::sync::Semaphore;

use super::{
    keygen::{self, CREDENTIAL_PREFIX},
    twofactor::{self, TotpError},
};

/// Schema is applied idempotently at connect time.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT,
    description TEXT,
    key_hash TEXT NOT NULL,
    permissions TEXT NOT NULL DEFAULT 'inference',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    last_used_at TEXT
);

CREATE TABLE IF NOT EXISTS two_factor (
    user_id INTEGER PRIMARY KEY REFERENCES users(id),
    secret TEXT NOT NULL,
    backup_codes TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token TEXT NOT NULL UNIQUE,
    user_id INTEGER NOT NULL REFERENCES users(id),
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    last_used_at TEXT,
    ip_address TEXT,
    user_agent TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
"#;

/// An authenticated identity. The credential verifier lives on the same row
/// but never leaves the store.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub permissions: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// A minted session token record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionRecord {
    pub id: i64,
    #[serde(skip_serializing)]
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of a second-factor enrollment.
pub struct TwoFactorEnrollment {
    pub secret_base32: String,
    pub provisioning_uri: String,
    pub backup_codes: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Credential does not match any active record")]
    UnknownCredential,

    #[error("Credential has expired")]
    CredentialExpired,

    #[error("No such principal")]
    UnknownPrincipal,

    #[error("Session token does not match any active session")]
    UnknownSession,

    #[error("Session has expired")]
    SessionExpired,

    #[error("Two-factor authentication is not enabled")]
    TwoFactorDisabled,

    #[error("Invalid two-factor code")]
    InvalidTwoFactor,

    #[error("Storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Credential hashing failure: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error(transparent)]
    Totp(#[from] TotpError),

    #[error("Worker failure: {0}")]
    Worker(String),
}

pub struct CredentialStore {
    pool: SqlitePool,
    /// Bounds concurrent bcrypt verifications. The hash is deliberately slow,
    /// so an unbounded scan would amplify a flood of invalid credentials into
    /// CPU exhaustion.
    verify_limiter: Arc<Semaphore>,
}

impl CredentialStore {
    /// Open (creating if missing) the sqlite store at `path`.
    pub async fn connect(path: &str, verify_concurrency: usize) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::with_pool(pool, verify_concurrency).await
    }

    /// In-memory store for tests. A single connection keeps every query on
    /// the same database.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(sqlx::Error::from)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool, 2).await
    }

    async fn with_pool(pool: SqlitePool, verify_concurrency: usize) -> Result<Self, StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self {
            pool,
            verify_limiter: Arc::new(Semaphore::new(verify_concurrency.max(1))),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    /// Enroll a new principal. Returns the principal and the plaintext
    /// credential, which is shown exactly once and never stored.
    pub async fn enroll(
        &self,
        name: &str,
        email: Option<&str>,
        description: Option<&str>,
        lifetime: Option<Duration>,
    ) -> Result<(Principal, String), StoreError> {
        let plaintext = keygen::generate_credential();
        let to_hash = plaintext.clone();
        let key_hash = tokio::task::spawn_blocking(move || keygen::hash_credential(&to_hash))
            .await
            .map_err(|e| StoreError::Worker(e.to_string()))??;

        let now = Utc::now();
        let expires_at = lifetime.map(|l| {
            now + chrono::Duration::from_std(l).unwrap_or_else(|_| chrono::Duration::zero())
        });

        let result = sqlx::query(
            "INSERT INTO users (name, email, description, key_hash, created_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(name)
        .bind(email)
        .bind(description)
        .bind(&key_hash)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        let principal = self.get_principal(result.last_insert_rowid()).await?;
        Ok((principal, plaintext))
    }

    /// Verify a plaintext credential.
    ///
    /// Linear scan over active records: the population is small (human users)
    /// and each probe costs a bcrypt verification, bounded by the limiter.
    pub async fn verify(&self, plaintext: &str) -> Result<Principal, StoreError> {
        if !keygen::has_prefix(plaintext, CREDENTIAL_PREFIX) {
            return Err(StoreError::UnknownCredential);
        }

        let rows = sqlx::query("SELECT id, key_hash FROM users WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            let id: i64 = row.get("id");
            let key_hash: String = row.get("key_hash");

            let permit = self
                .verify_limiter
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| StoreError::Worker(e.to_string()))?;
            let candidate = plaintext.to_string();
            let matched = tokio::task::spawn_blocking(move || {
                let matched = keygen::verify_credential(&candidate, &key_hash);
                drop(permit);
                matched
            })
            .await
            .map_err(|e| StoreError::Worker(e.to_string()))?;

            if matched {
                let principal = self.get_principal(id).await?;
                if let Some(expires_at) = principal.expires_at
                    && Utc::now() >= expires_at
                {
                    return Err(StoreError::CredentialExpired);
                }
                let now = Utc::now();
                sqlx::query("UPDATE users SET last_used_at = ?1 WHERE id = ?2")
                    .bind(now)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                return Ok(Principal {
                    last_used_at: Some(now),
                    ..principal
                });
            }
        }

        Err(StoreError::UnknownCredential)
    }

    /// Deactivate a principal. Records are never deleted.
    pub async fn deactivate(&self, principal_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
            .bind(principal_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_principal(&self, principal_id: i64) -> Result<Principal, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, email, permissions, is_active, created_at, expires_at, last_used_at \
             FROM users WHERE id = ?1",
        )
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::UnknownPrincipal)?;

        Ok(Self::principal_from_row(&row))
    }

    fn principal_from_row(row: &sqlx::sqlite::SqliteRow) -> Principal {
        Principal {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            permissions: row.get("permissions"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            last_used_at: row.get("last_used_at"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Second factor
    // ─────────────────────────────────────────────────────────────────────────

    /// Enroll (or re-enroll) a second factor for a principal.
    pub async fn enroll_two_factor(
        &self,
        principal_id: i64,
        account_name: &str,
        issuer: &str,
    ) -> Result<TwoFactorEnrollment, StoreError> {
        // Ensure the principal exists before attaching a factor.
        self.get_principal(principal_id).await?;

        let enrollment = twofactor::enroll(issuer, account_name)?;
        let backup_codes = keygen::generate_backup_codes();
        let codes_json = serde_json::to_string(&backup_codes).unwrap_or_default();

        sqlx::query(
            "INSERT INTO two_factor (user_id, secret, backup_codes, enabled) \
             VALUES (?1, ?2, ?3, 1) \
             ON CONFLICT(user_id) DO UPDATE SET secret = ?2, backup_codes = ?3, enabled = 1",
        )
        .bind(principal_id)
        .bind(&enrollment.secret_base32)
        .bind(&codes_json)
        .execute(&self.pool)
        .await?;

        Ok(TwoFactorEnrollment {
            secret_base32: enrollment.secret_base32,
            provisioning_uri: enrollment.provisioning_uri,
            backup_codes,
        })
    }

    pub async fn two_factor_enabled(&self, principal_id: i64) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT enabled FROM two_factor WHERE user_id = ?1")
            .bind(principal_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<bool, _>("enabled")).unwrap_or(false))
    }

    /// Verify a TOTP or backup code.
    ///
    /// TOTP is tried first. A backup code that matches is removed inside the
    /// same transaction that read it, so it can never validate twice.
    pub async fn verify_two_factor(&self, principal_id: i64, code: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT secret, backup_codes, enabled FROM two_factor WHERE user_id = ?1")
            .bind(principal_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Err(StoreError::TwoFactorDisabled);
        };
        if !row.get::<bool, _>("enabled") {
            return Err(StoreError::TwoFactorDisabled);
        }

        let secret: String = row.get("secret");
        if twofactor::verify_code(&secret, code)? {
            return Ok(());
        }

        let codes_json: String = row.get("backup_codes");
        let mut backup_codes: Vec<String> = serde_json::from_str(&codes_json).unwrap_or_default();
        if let Some(index) = backup_codes
            .iter()
            .position(|c| c.eq_ignore_ascii_case(code))
        {
            backup_codes.remove(index);
            let updated = serde_json::to_string(&backup_codes).unwrap_or_default();
            sqlx::query("UPDATE two_factor SET backup_codes = ?1 WHERE user_id = ?2")
                .bind(&updated)
                .bind(principal_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(());
        }

        Err(StoreError::InvalidTwoFactor)
    }

    /// Remaining backup codes, for the enrollment management surface.
    pub async fn backup_codes_remaining(&self, principal_id: i64) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT backup_codes FROM two_factor WHERE user_id = ?1")
            .bind(principal_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(0) };
        let codes: Vec<String> =
            serde_json::from_str(&row.get::<String, _>("backup_codes")).unwrap_or_default();
        Ok(codes.len())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Mint a session token for a principal.
    pub async fn mint_session(
        &self,
        principal_id: i64,
        lifetime: Duration,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<SessionRecord, StoreError> {
        let token = keygen::generate_session_token();
        let now = Utc::now();
        let expires_at =
            now + chrono::Duration::from_std(lifetime).unwrap_or_else(|_| chrono::Duration::zero());

        let result = sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at, ip_address, user_agent) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&token)
        .bind(principal_id)
        .bind(now)
        .bind(expires_at)
        .bind(ip_address)
        .bind(user_agent)
        .execute(&self.pool)
        .await?;

        Ok(SessionRecord {
            id: result.last_insert_rowid(),
            token,
            user_id: principal_id,
            created_at: now,
            expires_at,
            last_used_at: None,
            ip_address: ip_address.map(String::from),
            user_agent: user_agent.map(String::from),
        })
    }

    /// Verify a session token, advancing `last_used_at` on success.
    pub async fn verify_session(
        &self,
        token: &str,
    ) -> Result<(SessionRecord, Principal), StoreError> {
        let row = sqlx::query(
            "SELECT id, token, user_id, created_at, expires_at, last_used_at, \
                    ip_address, user_agent, is_active \
             FROM sessions WHERE token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(StoreError::UnknownSession);
        };
        if !row.get::<bool, _>("is_active") {
            return Err(StoreError::UnknownSession);
        }

        let expires_at: DateTime<Utc> = row.get("expires_at");
        let now = Utc::now();
        if now >= expires_at {
            return Err(StoreError::SessionExpired);
        }

        let session_id: i64 = row.get("id");
        let user_id: i64 = row.get("user_id");

        let principal = self.get_principal(user_id).await?;
        if !principal.is_active {
            return Err(StoreError::UnknownSession);
        }
        if let Some(principal_expires) = principal.expires_at
            && now >= principal_expires
        {
            return Err(StoreError::UnknownSession);
        }

        sqlx::query("UPDATE sessions SET last_used_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        let session = SessionRecord {
            id: session_id,
            token: row.get("token"),
            user_id,
            created_at: row.get("created_at"),
            expires_at,
            last_used_at: Some(now),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
        };

        Ok((session, principal))
    }

    pub async fn revoke_session(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE sessions SET is_active = 0 WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn revoke_all_sessions(&self, principal_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE sessions SET is_active = 0 WHERE user_id = ?1")
            .bind(principal_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Active, unexpired sessions for a principal.
    pub async fn list_sessions(&self, principal_id: i64) -> Result<Vec<SessionRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, token, user_id, created_at, expires_at, last_used_at, \
                    ip_address, user_agent \
             FROM sessions \
             WHERE user_id = ?1 AND is_active = 1 AND expires_at > ?2 \
             ORDER BY created_at DESC",
        )
        .bind(principal_id)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SessionRecord {
                id: row.get("id"),
                token: row.get("token"),
                user_id: row.get("user_id"),
                created_at: row.get("created_at"),
                expires_at: row.get("expires_at"),
                last_used_at: row.get("last_used_at"),
                ip_address: row.get("ip_address"),
                user_agent: row.get("user_agent"),
            })
            .collect())
    }

    /// Physically delete sessions past their expiry plus the grace window.
    /// Expired sessions are already rejected by `verify_session`; the sweep
    /// only bounds table growth.
    pub async fn sweep_sessions(&self, grace: Duration) -> Result<u64, StoreError> {
        let cutoff =
            Utc::now() - chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::zero());
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> CredentialStore {
        CredentialStore::connect_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn enroll_then_verify_succeeds_until_deactivated() {
        let store = store().await;
        let (principal, plaintext) = store.enroll("alice", None, None, None).await.unwrap();
        assert!(plaintext.starts_with("bdrk_"));

        let verified = store.verify(&plaintext).await.unwrap();
        assert_eq!(verified.id, principal.id);
        assert!(verified.last_used_at.is_some());

        store.deactivate(principal.id).await.unwrap();
        assert!(matches!(
            store.verify(&plaintext).await,
            Err(StoreError::UnknownCredential)
        ));
    }

    #[tokio::test]
    async fn wrong_credential_is_unknown() {
        let store = store().await;
        store.enroll("alice", None, None, None).await.unwrap();
        let bogus = format!("bdrk_{}", "0".repeat(64));
        assert!(matches!(
            store.verify(&bogus).await,
            Err(StoreError::UnknownCredential)
        ));
        assert!(matches!(
            store.verify("no-prefix").await,
            Err(StoreError::UnknownCredential)
        ));
    }

    #[tokio::test]
    async fn expired_principal_fails_with_expired() {
        let store = store().await;
        let (_, plaintext) = store
            .enroll("bob", None, None, Some(Duration::from_secs(0)))
            .await
            .unwrap();
        assert!(matches!(
            store.verify(&plaintext).await,
            Err(StoreError::CredentialExpired)
        ));
    }

    #[tokio::test]
    async fn backup_code_validates_exactly_once() {
        let store = store().await;
        let (principal, _) = store.enroll("carol", None, None, None).await.unwrap();
        let enrollment = store
            .enroll_two_factor(principal.id, "carol@example.com", "palisade")
            .await
            .unwrap();
        assert_eq!(enrollment.backup_codes.len(), 10);

        let code = enrollment.backup_codes[0].clone();
        store.verify_two_factor(principal.id, &code).await.unwrap();
        assert_eq!(store.backup_codes_remaining(principal.id).await.unwrap(), 9);

        assert!(matches!(
            store.verify_two_factor(principal.id, &code).await,
            Err(StoreError::InvalidTwoFactor)
        ));
        assert_eq!(store.backup_codes_remaining(principal.id).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn totp_code_validates() {
        let store = store().await;
        let (principal, _) = store.enroll("dave", None, None, None).await.unwrap();
        let enrollment = store
            .enroll_two_factor(principal.id, "dave", "palisade")
            .await
            .unwrap();

        let code = crate::auth::twofactor::current_code(&enrollment.secret_base32);
        store.verify_two_factor(principal.id, &code).await.unwrap();
        // TOTP codes are not consumed; backup codes stay intact
        assert_eq!(
            store.backup_codes_remaining(principal.id).await.unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn two_factor_without_enrollment_is_disabled() {
        let store = store().await;
        let (principal, _) = store.enroll("erin", None, None, None).await.unwrap();
        assert!(!store.two_factor_enabled(principal.id).await.unwrap());
        assert!(matches!(
            store.verify_two_factor(principal.id, "123456").await,
            Err(StoreError::TwoFactorDisabled)
        ));
    }

    #[tokio::test]
    async fn session_mint_verify_and_timestamps() {
        let store = store().await;
        let (principal, _) = store.enroll("frank", None, None, None).await.unwrap();
        let session = store
            .mint_session(
                principal.id,
                Duration::from_secs(3600),
                Some("203.0.113.9"),
                Some("curl/8"),
            )
            .await
            .unwrap();
        assert!(session.token.starts_with("bdrk_sess_"));
        assert!(session.expires_at > session.created_at);

        let (verified, bound) = store.verify_session(&session.token).await.unwrap();
        assert_eq!(bound.id, principal.id);
        assert!(verified.last_used_at.unwrap() >= verified.created_at);
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let store = store().await;
        let (principal, _) = store.enroll("grace", None, None, None).await.unwrap();
        let session = store
            .mint_session(principal.id, Duration::from_secs(0), None, None)
            .await
            .unwrap();
        assert!(matches!(
            store.verify_session(&session.token).await,
            Err(StoreError::SessionExpired)
        ));
    }

    #[tokio::test]
    async fn revoked_session_is_unknown() {
        let store = store().await;
        let (principal, _) = store.enroll("heidi", None, None, None).await.unwrap();
        let session = store
            .mint_session(principal.id, Duration::from_secs(3600), None, None)
            .await
            .unwrap();
        store.revoke_session(&session.token).await.unwrap();
        assert!(matches!(
            store.verify_session(&session.token).await,
            Err(StoreError::UnknownSession)
        ));
    }

    #[tokio::test]
    async fn deactivated_principal_invalidates_sessions() {
        let store = store().await;
        let (principal, _) = store.enroll("ivan", None, None, None).await.unwrap();
        let session = store
            .mint_session(principal.id, Duration::from_secs(3600), None, None)
            .await
            .unwrap();
        store.deactivate(principal.id).await.unwrap();
        assert!(matches!(
            store.verify_session(&session.token).await,
            Err(StoreError::UnknownSession)
        ));
    }

    #[tokio::test]
    async fn sweep_removes_only_long_expired_sessions() {
        let store = store().await;
        let (principal, _) = store.enroll("judy", None, None, None).await.unwrap();

        // Expired now, but within the grace window: kept.
        store
            .mint_session(principal.id, Duration::from_secs(0), None, None)
            .await
            .unwrap();
        let removed = store
            .sweep_sessions(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        // Grace of zero: expired rows are removed.
        let removed = store.sweep_sessions(Duration::from_secs(0)).await.unwrap();
        assert_eq!(removed, 1);

        // Live sessions survive any sweep.
        store
            .mint_session(principal.id, Duration::from_secs(3600), None, None)
            .await
            .unwrap();
        let removed = store.sweep_sessions(Duration::from_secs(0)).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn list_sessions_excludes_revoked_and_expired() {
        let store = store().await;
        let (principal, _) = store.enroll("kate", None, None, None).await.unwrap();

        let live = store
            .mint_session(principal.id, Duration::from_secs(3600), None, None)
            .await
            .unwrap();
        let revoked = store
            .mint_session(principal.id, Duration::from_secs(3600), None, None)
            .await
            .unwrap();
        store.revoke_session(&revoked.token).await.unwrap();
        store
            .mint_session(principal.id, Duration::from_secs(0), None, None)
            .await
            .unwrap();

        let sessions = store.list_sessions(principal.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, live.id);
    }
}
