//! Per-user authorization record.
//!
//! # Invariants
//! - `permissions` only ever contains catalog members (guaranteed by the
//!   [`Permission`] type; free-form tokens are rejected at parse time).
//! - Role defaults are seeded at creation and on role change; afterwards the
//!   set diverges freely through grants and revocations. It is stored state,
//!   never recomputed from the role at check time.
//! - Lock and OTP expiry are checked lazily at the moment of use.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use mesa_core::{DomainError, UserId};

use crate::catalog::RolePermissionMap;
use crate::otp::{OtpError, OtpRecord};
use crate::permissions::Permission;
use crate::roles::Role;

/// Consecutive failed logins that trigger a temporary lock.
pub const MAX_FAILED_LOGIN_ATTEMPTS: u32 = 5;

/// How long a triggered lock lasts.
pub const LOCK_DURATION_MINUTES: i64 = 15;

/// Outcome of an idempotent permission set operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionChange {
    Added,
    Removed,
    NoOp,
}

impl PermissionChange {
    pub fn is_noop(&self) -> bool {
        matches!(self, PermissionChange::NoOp)
    }
}

/// A user account as the authorization core sees it.
///
/// Business-profile fields (phone numbers, avatars, ...) belong to the CRUD
/// layer; only what authorization decisions need lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub permissions: BTreeSet<Permission>,
    pub is_active: bool,
    pub is_verified: bool,
    pub failed_login_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub otp: Option<OtpRecord>,
    pub last_login: Option<DateTime<Utc>>,
    /// Seeded platform accounts excluded from user listings. Replaces the
    /// historical hardcoded super-admin email comparison.
    pub system_account: bool,
}

/// Safe projection for listings and API responses. No hash, no OTP, no
/// lockout counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub permissions: BTreeSet<Permission>,
    pub is_verified: bool,
    pub is_active: bool,
}

impl UserAccount {
    /// Create an account with the role's default permission set copied in.
    ///
    /// New accounts start active but unverified; verification happens through
    /// the OTP flow.
    pub fn new(
        id: UserId,
        name: &str,
        email: &str,
        password_hash: String,
        role: Role,
        map: &RolePermissionMap,
    ) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.len() < 2 || name.len() > 100 {
            return Err(DomainError::validation(
                "name must be between 2 and 100 characters",
            ));
        }

        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        Ok(Self {
            id,
            name: name.to_string(),
            email,
            password_hash,
            role,
            permissions: map.defaults(role).clone(),
            is_active: true,
            is_verified: false,
            failed_login_attempts: 0,
            lock_until: None,
            otp: None,
            last_login: None,
            system_account: false,
        })
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            permissions: self.permissions.clone(),
            is_verified: self.is_verified,
            is_active: self.is_active,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Role & permission overrides
    // ─────────────────────────────────────────────────────────────────────

    /// Change the role, replacing the permission set with the new role's
    /// defaults.
    ///
    /// This is a destructive reset, not a merge: custom grants made under the
    /// old role are lost. Callers that want to keep them must re-grant after
    /// the change.
    pub fn change_role(&mut self, role: Role, map: &RolePermissionMap) {
        self.role = role;
        self.permissions = map.defaults(role).clone();
    }

    /// Add a permission to the override set. No-op if already present.
    pub fn grant(&mut self, permission: Permission) -> PermissionChange {
        if self.permissions.insert(permission) {
            PermissionChange::Added
        } else {
            PermissionChange::NoOp
        }
    }

    /// Remove a permission from the override set. No-op if absent.
    pub fn revoke(&mut self, permission: Permission) -> PermissionChange {
        if self.permissions.remove(&permission) {
            PermissionChange::Removed
        } else {
            PermissionChange::NoOp
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lockout state machine
    // ─────────────────────────────────────────────────────────────────────

    /// Whether the account is inside an active lock window.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| now < until)
    }

    /// Record a failed login attempt.
    ///
    /// Returns the lock deadline if this attempt crossed the threshold.
    pub fn register_failed_login(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.failed_login_attempts += 1;
        if self.failed_login_attempts >= MAX_FAILED_LOGIN_ATTEMPTS {
            let until = now + Duration::minutes(LOCK_DURATION_MINUTES);
            self.lock_until = Some(until);
            return Some(until);
        }
        None
    }

    /// Record a successful login.
    ///
    /// Clears the failure counter and any (expired) lock. The lock is never
    /// swept proactively; this is where lazy expiry takes effect.
    pub fn register_successful_login(&mut self, now: DateTime<Utc>) {
        if self.failed_login_attempts > 0 || self.lock_until.is_some() {
            self.failed_login_attempts = 0;
            self.lock_until = None;
        }
        self.last_login = Some(now);
    }

    // ─────────────────────────────────────────────────────────────────────
    // OTP state machine
    // ─────────────────────────────────────────────────────────────────────

    /// Attach a fresh one-time code, overwriting any prior one. The old code
    /// is invalid from this point on.
    pub fn issue_otp(&mut self, code: String, now: DateTime<Utc>, ttl: Duration) {
        self.otp = Some(OtpRecord::new(code, now, ttl));
    }

    /// Check a submitted code against the live OTP and consume it on success.
    ///
    /// Single use: a second submission of the same code fails even inside the
    /// expiry window.
    pub fn consume_otp(&mut self, submitted: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        let otp = self.otp.as_ref().ok_or(OtpError::InvalidOrExpired)?;
        otp.matches(submitted, now)?;
        self.otp = None;
        Ok(())
    }
}
