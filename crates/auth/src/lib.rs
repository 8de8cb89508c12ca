//! `mesa-auth` — pure authentication/authorization domain.
//!
//! This crate is intentionally decoupled from HTTP and storage. It defines the
//! permission catalog, the per-user authorization record with its lockout and
//! OTP state machines, and the request-time authorization decision. All
//! functions here are deterministic over already-loaded state; persistence and
//! transport live in `mesa-store` and `mesa-api`.

pub mod authorize;
pub mod catalog;
pub mod claims;
pub mod otp;
pub mod password;
pub mod permissions;
pub mod record;
pub mod roles;
pub mod token;

pub use authorize::{AccessDenied, AuthzError, Principal, require_all, require_any};
pub use catalog::{CatalogError, RolePermissionMap};
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use otp::{OtpError, OtpRecord, generate_otp_code};
pub use password::{PasswordError, hash_password, verify_password};
pub use permissions::{Permission, UnknownPermission};
pub use record::{
    LOCK_DURATION_MINUTES, MAX_FAILED_LOGIN_ATTEMPTS, PermissionChange, UserAccount, UserProfile,
};
pub use roles::{Role, UnknownRole};
pub use token::{Hs256TokenCodec, TokenCodec, TokenError};
