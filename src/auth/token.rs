use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Tokens are valid for thirty days unless configured otherwise.
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token secret must not be empty")]
    EmptySecret,

    #[error("Malformed token")]
    Malformed,

    #[error("Token signature is invalid")]
    BadSignature,

    #[error("Token has expired")]
    Expired,
}

/// Issues and verifies signed bearer tokens of the form
/// `<user-id>.<expiry-unix-seconds>.<hex hmac-sha256>`.
#[derive(Clone)]
pub struct TokenIssuer {
    mac: HmacSha256,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::EmptySecret)?;
        Ok(Self { mac, ttl })
    }

    pub fn with_default_ttl(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        Self::new(secret, Duration::days(DEFAULT_TOKEN_TTL_DAYS))
    }

    pub fn issue(&self, user_id: UserId) -> String {
        self.issue_at(user_id, Utc::now())
    }

    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        self.verify_at(token, Utc::now())
    }

    fn issue_at(&self, user_id: UserId, now: DateTime<Utc>) -> String {
        let expires = (now + self.ttl).timestamp();
        let payload = format!("{}.{}", user_id, expires);
        let signature = hex::encode(self.sign(&payload).finalize().into_bytes());
        format!("{}.{}", payload, signature)
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, TokenError> {
        let (payload, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (user_id, expires) = payload.split_once('.').ok_or(TokenError::Malformed)?;

        let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;
        self.sign(payload)
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let expires: i64 = expires.parse().map_err(|_| TokenError::Malformed)?;
        if now.timestamp() >= expires {
            return Err(TokenError::Expired);
        }

        Uuid::parse_str(user_id).map_err(|_| TokenError::Malformed)
    }

    fn sign(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
