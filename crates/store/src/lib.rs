//! `mesa-store` — persistence contract and account orchestration.
//!
//! The authorization domain in `mesa-auth` is pure; this crate supplies the
//! two things around it: the [`UserStore`] persistence contract (with the
//! atomicity the lockout counter and permission overrides depend on) and the
//! [`AccountService`] that drives login, OTP flows and the user lifecycle
//! against a store.

pub mod delivery;
pub mod in_memory;
pub mod service;
pub mod user_store;

pub use delivery::{LogOtpDelivery, OtpDelivery};
pub use in_memory::InMemoryUserStore;
pub use service::{AccountError, AccountService, LoginSuccess, NewUser, PermissionOutcome};
pub use user_store::{StoreError, UserStore};
