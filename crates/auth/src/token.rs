//! Session token encoding/decoding.
//!
//! Tokens are self-contained: validating one needs no shared mutable state,
//! so authorization checks scale without coordination. The cost is that a
//! revocation or permission change is not observed until re-issuance.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{SessionClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("failed to encode token: {0}")]
    Encode(String),
}

/// Transport-agnostic session token codec.
pub trait TokenCodec: Send + Sync {
    fn encode(&self, claims: &SessionClaims) -> Result<String, TokenError>;

    /// Decode, verify the signature, and validate the claim time window
    /// against `now`.
    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError>;
}

/// HMAC-SHA256 JWT codec.
pub struct Hs256TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl TokenCodec for Hs256TokenCodec {
    fn encode(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        // `exp` is validated again below via `validate_claims` with the
        // caller's clock; disable the library's own check so the two clocks
        // cannot disagree.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?;

        validate_claims(&data.claims, now).map_err(|e| match e {
            TokenValidationError::Expired => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

        Ok(data.claims)
    }
}
