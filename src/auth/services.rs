use std::str::FromStr;
use std::time::Duration;

use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, error};

pub(crate) use crate::auth::dto::{Claims, JwtKeys, TokenKind};
use crate::config::JwtConfig;
use crate::state::AppState;

/// Validity window for email confirmation and password-reset links.
const EMAIL_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Canonical form for email addresses. Every handler that stores or
/// looks up a user by email goes through this, so "Alice@X.com" and
/// "alice@x.com" always land on the same row.
pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Verify a password against a stored hash. A malformed stored hash is an
/// ordinary mismatch, never a panic or an error the caller has to handle.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        error!("malformed password hash in store");
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            algorithm,
            expiration_seconds,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::from_str(&algorithm).unwrap_or(Algorithm::HS256),
            access_ttl: Duration::from_secs(expiration_seconds.max(0) as u64),
        }
    }
}

impl JwtKeys {
    fn sign(&self, sub: &str, kind: TokenKind, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: sub.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: (now + ttl).unix_timestamp() as usize,
            kind,
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(sub = %sub, kind = ?kind, "jwt signed");
        Ok(token)
    }

    /// Short-lived access token bound to a username.
    pub fn sign_access(&self, username: &str) -> anyhow::Result<String> {
        self.sign(username, TokenKind::Access, self.access_ttl)
    }

    /// Long-lived email-action token bound to an email address.
    pub fn sign_email(&self, email: &str, kind: TokenKind) -> anyhow::Result<String> {
        self.sign(email, kind, EMAIL_TOKEN_TTL)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let validation = Validation::new(self.algorithm);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(sub = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    /// Verify an email-action token of the expected purpose and extract
    /// the email address it was issued for.
    pub fn email_from_token(&self, token: &str, expected: TokenKind) -> anyhow::Result<String> {
        let claims = self.verify(token)?;
        if claims.kind != expected {
            anyhow::bail!("wrong token purpose");
        }
        Ok(claims.sub)
    }
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn verify_rejects_malformed_hash_without_panicking() {
        assert!(!verify_password("anything", "not-a-valid-hash"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn distinct_passwords_hash_differently() {
        let h1 = hash_password("first-password").unwrap();
        assert!(!verify_password("second-password", &h1));
    }
}

#[cfg(test)]
mod jwt_tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_access_token() {
        let keys = make_keys();
        let token = keys.sign_access("alice").expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn email_token_roundtrips_subject() {
        let keys = make_keys();
        let token = keys
            .sign_email("alice@x.com", TokenKind::Verify)
            .expect("sign email token");
        let email = keys
            .email_from_token(&token, TokenKind::Verify)
            .expect("extract email");
        assert_eq!(email, "alice@x.com");
    }

    #[tokio::test]
    async fn confirmation_token_is_rejected_by_reset_purpose() {
        let keys = make_keys();
        let token = keys.sign_email("alice@x.com", TokenKind::Verify).unwrap();
        let err = keys
            .email_from_token(&token, TokenKind::Reset)
            .unwrap_err();
        assert!(err.to_string().contains("wrong token purpose"));
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let keys = make_keys();
        let mut token = keys.sign_access("alice").unwrap();
        token.pop();
        token.push('A');
        assert!(keys.verify(&token).is_err());
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let keys = make_keys();
        assert!(keys.verify("definitely.not.a-jwt").is_err());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: "alice".into(),
            iat: (now - 7200) as usize,
            exp: (now - 3600) as usize,
            kind: TokenKind::Access,
        };
        let token = encode(&Header::new(keys.algorithm), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_err());
    }
}

#[cfg(test)]
mod email_validation_tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn rejects_obvious_garbage() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@domain"));
        assert!(!is_valid_email("user name@example.com"));
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  Alice@X.com "), "alice@x.com");
        assert_eq!(normalize_email("bob@example.org"), "bob@example.org");
        assert_eq!(normalize_email("MIXED.Case@Sub.Domain.COM"), "mixed.case@sub.domain.com");
    }
}
