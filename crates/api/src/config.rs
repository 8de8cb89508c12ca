//! Environment-driven configuration.

use anyhow::{Context, bail};
use chrono::Duration;

/// API process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub jwt_secret: String,
    pub otp_ttl: Duration,
    pub token_ttl: Duration,
    /// Seed identity for the system admin account. Optional: without it the
    /// process starts with an empty user table.
    pub admin_seed: Option<AdminSeed>,
}

#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl ApiConfig {
    /// Read configuration from the environment.
    ///
    /// `MESA_JWT_SECRET` is required; everything else has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(v) => v.parse::<u16>().context("PORT must be a valid port number")?,
            Err(_) => 5000,
        };

        let jwt_secret =
            std::env::var("MESA_JWT_SECRET").context("MESA_JWT_SECRET must be set")?;
        if jwt_secret.len() < 16 {
            bail!("MESA_JWT_SECRET must be at least 16 bytes");
        }

        let otp_ttl = Duration::seconds(env_i64("MESA_OTP_TTL_SECS", 300)?);
        let token_ttl = Duration::seconds(env_i64("MESA_TOKEN_TTL_SECS", 86_400)?);

        let admin_seed = match (
            std::env::var("MESA_ADMIN_EMAIL"),
            std::env::var("MESA_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some(AdminSeed {
                name: std::env::var("MESA_ADMIN_NAME")
                    .unwrap_or_else(|_| "System Administrator".to_string()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            port,
            jwt_secret,
            otp_ttl,
            token_ttl,
            admin_seed,
        })
    }
}

fn env_i64(key: &str, default: i64) -> anyhow::Result<i64> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<i64>()
            .with_context(|| format!("{key} must be an integer")),
        Err(_) => Ok(default),
    }
}
