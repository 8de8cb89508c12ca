//! Request-time authorization decision.
//!
//! A pure predicate over already-loaded state: given the principal decoded
//! from a session token and the permissions an action requires, decide
//! allow/deny. No IO, no panics, no business logic.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use mesa_core::UserId;

use crate::catalog::RolePermissionMap;
use crate::permissions::Permission;
use crate::roles::Role;

/// The authenticated caller, as snapshotted into the session token at
/// issuance. Permission changes made after issuance are not visible here
/// until the token is re-issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub permissions: BTreeSet<Permission>,
}

/// Denial detail for client-side diagnostics.
///
/// Only ever describes the caller's own permission set; handlers must not
/// echo it for a different user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDenied {
    pub required: Vec<Permission>,
    pub missing: Vec<Permission>,
    pub user_has: Vec<Permission>,
}

impl core::fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "missing permission(s): ")?;
        for (i, p) in self.missing.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// No principal present on the request.
    #[error("authentication required")]
    Unauthenticated,

    /// The principal's role has no entry in the role→permission table.
    #[error("invalid user role")]
    InvalidRole,

    /// Authenticated but lacking the required permission(s).
    #[error("insufficient permissions: {0}")]
    Forbidden(AccessDenied),
}

/// Allow iff the principal holds **every** required permission.
pub fn require_all(
    map: &RolePermissionMap,
    principal: Option<&Principal>,
    required: &[Permission],
) -> Result<(), AuthzError> {
    let principal = gate(map, principal)?;
    if principal.role.is_admin() {
        return Ok(());
    }

    let missing: Vec<Permission> = required
        .iter()
        .filter(|p| !principal.permissions.contains(p))
        .copied()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(denied(principal, required, missing)))
    }
}

/// Allow iff the principal holds **at least one** required permission.
pub fn require_any(
    map: &RolePermissionMap,
    principal: Option<&Principal>,
    required: &[Permission],
) -> Result<(), AuthzError> {
    let principal = gate(map, principal)?;
    if principal.role.is_admin() {
        return Ok(());
    }

    if required.iter().any(|p| principal.permissions.contains(p)) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(denied(
            principal,
            required,
            required.to_vec(),
        )))
    }
}

fn gate<'a>(
    map: &RolePermissionMap,
    principal: Option<&'a Principal>,
) -> Result<&'a Principal, AuthzError> {
    let principal = principal.ok_or(AuthzError::Unauthenticated)?;
    // Unreachable for the builtin table (it is total over Role), but tables
    // built from configuration may be partial, so reject unknown roles at
    // check time.
    if !map.contains(principal.role) {
        return Err(AuthzError::InvalidRole);
    }
    Ok(principal)
}

fn denied(principal: &Principal, required: &[Permission], missing: Vec<Permission>) -> AccessDenied {
    AccessDenied {
        required: required.to_vec(),
        missing,
        user_has: principal.permissions.iter().copied().collect(),
    }
}
