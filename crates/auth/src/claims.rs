use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mesa_core::UserId;

use crate::authorize::Principal;
use crate::permissions::Permission;
use crate::record::UserAccount;
use crate::roles::Role;

/// Claims carried by a session token.
///
/// The permission set is a snapshot taken at issuance; grants and
/// revocations made afterwards only become visible when the token is
/// re-issued. Timestamps are unix seconds, the standard JWT wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the account identifier.
    pub sub: UserId,

    pub email: String,

    pub role: Role,

    /// Permission snapshot at issuance time.
    pub permissions: Vec<Permission>,

    /// Issued-at timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

impl SessionClaims {
    /// Snapshot claims for an account at `now`, valid for `ttl`.
    pub fn for_account(account: &UserAccount, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: account.id,
            email: account.email.clone(),
            role: account.role,
            permissions: account.permissions.iter().copied().collect(),
            iat: now,
            exp: now + ttl,
        }
    }

    /// The principal these claims describe.
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.sub,
            email: self.email.clone(),
            role: self.role,
            permissions: self.permissions.iter().copied().collect(),
        }
    }
}

/// Deterministically validate the claim time window.
///
/// Signature verification is the token codec's job; this checks the *claims*
/// only.
pub fn validate_claims(
    claims: &SessionClaims,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RolePermissionMap;

    fn claims(iat: DateTime<Utc>, exp: DateTime<Utc>) -> SessionClaims {
        SessionClaims {
            sub: UserId::new(),
            email: "c@example.com".into(),
            role: Role::Waiter,
            permissions: vec![Permission::OrderView],
            iat,
            exp,
        }
    }

    #[test]
    fn valid_window_passes() {
        let now = Utc::now();
        let c = claims(now - Duration::minutes(1), now + Duration::minutes(10));
        assert!(validate_claims(&c, now).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now();
        let c = claims(now - Duration::minutes(20), now - Duration::minutes(10));
        assert_eq!(
            validate_claims(&c, now).unwrap_err(),
            TokenValidationError::Expired
        );
    }

    #[test]
    fn future_iat_is_rejected() {
        let now = Utc::now();
        let c = claims(now + Duration::minutes(5), now + Duration::minutes(10));
        assert_eq!(
            validate_claims(&c, now).unwrap_err(),
            TokenValidationError::NotYetValid
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let c = claims(now, now);
        assert_eq!(
            validate_claims(&c, now).unwrap_err(),
            TokenValidationError::InvalidTimeWindow
        );
    }

    #[test]
    fn snapshot_reflects_account_state_at_issuance() {
        let map = RolePermissionMap::builtin().unwrap();
        let mut acct = UserAccount::new(
            UserId::new(),
            "Tenzin",
            "tenzin@example.com",
            "h".into(),
            Role::Kitchen,
            &map,
        )
        .unwrap();
        acct.grant(Permission::BillView);

        let now = Utc::now();
        let claims = SessionClaims::for_account(&acct, now, Duration::days(1));
        let principal = claims.principal();

        assert_eq!(principal.user_id, acct.id);
        assert_eq!(principal.role, Role::Kitchen);
        assert!(principal.permissions.contains(&Permission::BillView));

        // Post-issuance mutations are not visible in the snapshot.
        acct.revoke(Permission::BillView);
        assert!(claims.principal().permissions.contains(&Permission::BillView));
    }
}
