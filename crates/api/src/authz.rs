//! Handler-side permission guards.
//!
//! Thin wrappers over the pure decision functions that translate a denial
//! into an HTTP error. Handlers call these before touching any state.

use mesa_auth::{Permission, Principal, RolePermissionMap};

use crate::errors::ApiError;

/// Allow only if the principal holds every listed permission.
pub fn require_all(
    map: &RolePermissionMap,
    principal: &Principal,
    required: &[Permission],
) -> Result<(), ApiError> {
    mesa_auth::require_all(map, Some(principal), required).map_err(ApiError::from)
}

/// Allow if the principal holds at least one listed permission.
pub fn require_any(
    map: &RolePermissionMap,
    principal: &Principal,
    required: &[Permission],
) -> Result<(), ApiError> {
    mesa_auth::require_any(map, Some(principal), required).map_err(ApiError::from)
}
