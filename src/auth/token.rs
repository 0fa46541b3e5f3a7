//! Bearer access tokens.
//!
//! Tokens are HS256 JWTs carrying the user id and an expiry. The signing key is
//! handed to [`TokenService::new`] from configuration; nothing here reads the
//! environment.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Signing key rejected")]
    InvalidKey,

    #[error("Failed to sign token: {0}")]
    Signature(#[source] jwt::Error),

    #[error("Failed to verify token: {0}")]
    Verification(#[source] jwt::Error),

    #[error("Token expired at {0}")]
    Expired(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Claims {
    user_id: i64,
    #[serde(rename = "iat")]
    issued_at: i64,
    #[serde(rename = "exp")]
    expires: i64,
}

#[derive(Clone)]
pub struct TokenService {
    key: Hmac<Sha256>,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], lifetime: Duration) -> Result<Self, TokenError> {
        let key: Hmac<Sha256> =
            Hmac::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
        Ok(Self { key, lifetime })
    }

    pub fn issue(&self, user_id: i64) -> Result<String, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: i64, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            user_id,
            issued_at: now.timestamp(),
            expires: (now + self.lifetime).timestamp(),
        };
        claims
            .sign_with_key(&self.key)
            .map_err(TokenError::Signature)
    }

    /// Check the signature and expiry, returning the user id the token names.
    pub fn verify(&self, token: &str) -> Result<i64, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<i64, TokenError> {
        let claims: Claims = token
            .verify_with_key(&self.key)
            .map_err(TokenError::Verification)?;

        if now.timestamp() >= claims.expires {
            let expires = DateTime::<Utc>::from_timestamp(claims.expires, 0).unwrap_or(now);
            return Err(TokenError::Expired(expires));
        }

        Ok(claims.user_id)
    }
}

/// Random 64-character hex secret for deployments that configured none.
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
