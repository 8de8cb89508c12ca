//! One-time codes for account verification and password reset.
//!
//! A user owns at most one live OTP. Issuing a new code overwrites the old
//! one, and a successful check consumes it. Expiry is checked lazily at the
//! moment of use; nothing sweeps expired codes in the background.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of digits in a generated code.
pub const OTP_LENGTH: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OtpError {
    /// No live code, wrong code, or code past its expiry. Deliberately one
    /// variant: callers must not be able to tell which.
    #[error("invalid or expired OTP")]
    InvalidOrExpired,
}

/// A live one-time code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRecord {
    code: String,
    expires_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn new(code: String, issued_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            code,
            expires_at: issued_at + ttl,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Exact-match check (no normalization) against a submitted code.
    pub fn matches(&self, submitted: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        if self.code != submitted || now >= self.expires_at {
            return Err(OtpError::InvalidOrExpired);
        }
        Ok(())
    }
}

/// Generate a fixed-length numeric code.
pub fn generate_otp_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:0width$}", n, width = OTP_LENGTH)
}
