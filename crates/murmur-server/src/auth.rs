//! Session tokens and the authenticated-caller extractor.
//!
//! A token has the form `<user-uuid>.<expiry-unix>.<hex-mac>` where the MAC is
//! a BLAKE3 keyed hash of `<user-uuid>.<expiry-unix>` under the server secret.
//! Tokens are bearer credentials: anyone holding one acts as that user until
//! it expires.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

use murmur_shared::types::UserId;
use murmur_store::User;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed token")]
    Malformed,

    #[error("token expired")]
    Expired,

    #[error("invalid token signature")]
    BadSignature,
}

/// Turns an opaque caller-supplied token into a verified identity.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify(&self, token: &str) -> Result<UserId, AuthError>;
}

/// Stateless MAC-based tokens.
#[derive(Clone)]
pub struct TokenAuthenticator {
    key: [u8; 32],
    ttl: Duration,
}

impl TokenAuthenticator {
    pub fn new(key: [u8; 32], ttl_hours: i64) -> Self {
        Self {
            key,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issue a token for `user` valid for the configured lifetime.
    pub fn issue(&self, user: UserId) -> String {
        self.issue_until(user, Utc::now() + self.ttl)
    }

    pub fn issue_until(&self, user: UserId, expires_at: DateTime<Utc>) -> String {
        let claims = format!("{}.{}", user, expires_at.timestamp());
        let mac = self.mac(&claims);
        format!("{claims}.{}", hex::encode(mac))
    }

    fn mac(&self, claims: &str) -> [u8; 32] {
        *blake3::keyed_hash(&self.key, claims.as_bytes()).as_bytes()
    }

    fn check(&self, token: &str) -> Result<UserId, AuthError> {
        let (claims, mac_hex) = token.trim().rsplit_once('.').ok_or(AuthError::Malformed)?;
        let (user, expiry) = claims.split_once('.').ok_or(AuthError::Malformed)?;

        let user = UserId::parse(user).map_err(|_| AuthError::Malformed)?;
        let expiry: i64 = expiry.parse().map_err(|_| AuthError::Malformed)?;
        let provided = hex::decode(mac_hex).map_err(|_| AuthError::Malformed)?;

        let expected = self.mac(claims);
        if provided.len() != expected.len() || provided.ct_eq(&expected).unwrap_u8() != 1 {
            return Err(AuthError::BadSignature);
        }
        if Utc::now().timestamp() >= expiry {
            return Err(AuthError::Expired);
        }
        Ok(user)
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        self.check(token)
    }
}

/// Resolve a token to a stored user. Unknown users are rejected even when
/// the token itself is valid.
pub async fn authenticate(state: &AppState, token: &str) -> Result<User, ServerError> {
    let user_id = state.auth.verify(token).await.map_err(|e| {
        debug!(error = %e, "Rejected session token");
        ServerError::from(e)
    })?;
    state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ServerError::Unauthorized("unknown user".into()))
}

/// The authenticated caller of a REST handler, loaded fresh from the store.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServerError::Unauthorized("missing Authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServerError::Unauthorized("expected a Bearer token".into()))?;

        authenticate(state, token).await.map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> TokenAuthenticator {
        TokenAuthenticator::new([7u8; 32], 24)
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let auth = authenticator();
        let user = UserId::new();
        let token = auth.issue(user);
        assert_eq!(auth.verify(&token).await, Ok(user));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let auth = authenticator();
        let token = auth.issue_until(UserId::new(), Utc::now() - Duration::seconds(1));
        assert_eq!(auth.verify(&token).await, Err(AuthError::Expired));
    }

    #[tokio::test]
    async fn test_tampered_token_rejected() {
        let auth = authenticator();
        let token = auth.issue(UserId::new());
        let (_, rest) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", UserId::new(), rest);
        assert_eq!(auth.verify(&forged).await, Err(AuthError::BadSignature));

        let other = TokenAuthenticator::new([8u8; 32], 24);
        assert_eq!(other.verify(&token).await, Err(AuthError::BadSignature));
    }

    #[tokio::test]
    async fn test_garbage_is_malformed() {
        let auth = authenticator();
        for token in ["", "abc", "a.b.c", "not-a-uuid.123.00"] {
            assert_eq!(auth.verify(token).await, Err(AuthError::Malformed), "{token}");
        }
    }
}
