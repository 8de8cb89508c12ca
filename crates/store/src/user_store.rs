//! Persistence contract for user authorization records.
//!
//! The core never issues queries; it names fields and the atomicity it
//! needs. Two operations are explicitly conditional so concurrent requests
//! for the same user cannot lose updates: permission add/remove
//! (add-if-absent / remove-if-present) and the read-modify-write used for
//! login counters.

use mesa_auth::{Permission, PermissionChange, UserAccount};
use mesa_core::UserId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,

    #[error("email already registered")]
    EmailTaken,

    /// Unexpected backend failure. Detail stays server-side; callers surface
    /// a generic error.
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Storage collaborator for [`UserAccount`] records.
///
/// # Atomicity contract
///
/// - [`update`](UserStore::update) and [`try_update`](UserStore::try_update)
///   apply their closure as one atomic read-modify-write. Concurrent failed
///   logins from the same account must each observe the previous counter
///   value, so the lockout threshold cannot be skipped by a race.
/// - [`add_permission`](UserStore::add_permission) and
///   [`remove_permission`](UserStore::remove_permission) are conditional:
///   two simultaneous grants of different permissions to one user must both
///   survive.
pub trait UserStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::EmailTaken`] if the
    /// email is already registered.
    fn insert(&self, account: UserAccount) -> Result<(), StoreError>;

    fn find_by_id(&self, id: UserId) -> Result<Option<UserAccount>, StoreError>;

    /// Lookup by normalized (lowercased) email.
    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError>;

    /// Atomic read-modify-write. Returns the updated record.
    fn update<F>(&self, id: UserId, f: F) -> Result<UserAccount, StoreError>
    where
        F: FnOnce(&mut UserAccount);

    /// Atomic read-modify-write that commits only if the closure succeeds.
    ///
    /// The outer `Result` is storage failure; the inner one is the closure's
    /// own verdict. On `Err` the record is left untouched.
    fn try_update<T, E, F>(&self, id: UserId, f: F) -> Result<Result<T, E>, StoreError>
    where
        F: FnOnce(&mut UserAccount) -> Result<T, E>;

    /// Add-if-absent. Reports [`PermissionChange::NoOp`] when already present.
    fn add_permission(
        &self,
        id: UserId,
        permission: Permission,
    ) -> Result<(PermissionChange, UserAccount), StoreError>;

    /// Remove-if-present. Reports [`PermissionChange::NoOp`] when absent.
    fn remove_permission(
        &self,
        id: UserId,
        permission: Permission,
    ) -> Result<(PermissionChange, UserAccount), StoreError>;

    fn delete(&self, id: UserId) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<UserAccount>, StoreError>;
}
