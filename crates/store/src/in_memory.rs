use std::collections::HashMap;
use std::sync::RwLock;

use mesa_auth::{Permission, PermissionChange, UserAccount};
use mesa_core::UserId;

use crate::user_store::{StoreError, UserStore};

/// In-memory user store.
///
/// Intended for tests/dev. Every mutation runs under a single write guard,
/// which trivially satisfies the trait's atomicity contract.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, UserAccount>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl UserStore for InMemoryUserStore {
    fn insert(&self, account: UserAccount) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users.values().any(|u| u.email == account.email) {
            return Err(StoreError::EmailTaken);
        }
        users.insert(account.id, account);
        Ok(())
    }

    fn find_by_id(&self, id: UserId) -> Result<Option<UserAccount>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(&id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    fn update<F>(&self, id: UserId, f: F) -> Result<UserAccount, StoreError>
    where
        F: FnOnce(&mut UserAccount),
    {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let account = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        f(account);
        Ok(account.clone())
    }

    fn try_update<T, E, F>(&self, id: UserId, f: F) -> Result<Result<T, E>, StoreError>
    where
        F: FnOnce(&mut UserAccount) -> Result<T, E>,
    {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let account = users.get_mut(&id).ok_or(StoreError::NotFound)?;

        // Run on a scratch copy; commit only on success.
        let mut scratch = account.clone();
        match f(&mut scratch) {
            Ok(value) => {
                *account = scratch;
                Ok(Ok(value))
            }
            Err(e) => Ok(Err(e)),
        }
    }

    fn add_permission(
        &self,
        id: UserId,
        permission: Permission,
    ) -> Result<(PermissionChange, UserAccount), StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let account = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        let change = account.grant(permission);
        Ok((change, account.clone()))
    }

    fn remove_permission(
        &self,
        id: UserId,
        permission: Permission,
    ) -> Result<(PermissionChange, UserAccount), StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let account = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        let change = account.revoke(permission);
        Ok((change, account.clone()))
    }

    fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        users.remove(&id).ok_or(StoreError::NotFound)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<UserAccount>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        let mut all: Vec<UserAccount> = users.values().cloned().collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesa_auth::{Role, RolePermissionMap};
    use std::sync::Arc;

    fn account(email: &str) -> UserAccount {
        let map = RolePermissionMap::builtin().unwrap();
        UserAccount::new(UserId::new(), "Test User", email, "h".into(), Role::Waiter, &map)
            .unwrap()
    }

    #[test]
    fn insert_enforces_unique_email() {
        let store = InMemoryUserStore::new();
        store.insert(account("a@example.com")).unwrap();
        assert_eq!(
            store.insert(account("a@example.com")).unwrap_err(),
            StoreError::EmailTaken
        );
    }

    #[test]
    fn find_by_email_uses_normalized_form() {
        let store = InMemoryUserStore::new();
        let acct = account("b@example.com");
        let id = acct.id;
        store.insert(acct).unwrap();

        assert_eq!(store.find_by_email("b@example.com").unwrap().unwrap().id, id);
        assert!(store.find_by_email("missing@example.com").unwrap().is_none());
    }

    #[test]
    fn try_update_rolls_back_on_closure_error() {
        let store = InMemoryUserStore::new();
        let acct = account("c@example.com");
        let id = acct.id;
        store.insert(acct).unwrap();

        let result: Result<(), &str> = store
            .try_update(id, |a| {
                a.is_verified = true;
                Err("nope")
            })
            .unwrap();
        assert!(result.is_err());
        assert!(!store.find_by_id(id).unwrap().unwrap().is_verified);
    }

    #[test]
    fn conditional_permission_ops_report_noop() {
        let store = InMemoryUserStore::new();
        let acct = account("d@example.com");
        let id = acct.id;
        store.insert(acct).unwrap();

        let (first, _) = store.add_permission(id, Permission::BillView).unwrap();
        let (second, _) = store.add_permission(id, Permission::BillView).unwrap();
        assert_eq!(first, PermissionChange::Added);
        assert_eq!(second, PermissionChange::NoOp);

        let (third, _) = store.remove_permission(id, Permission::BillView).unwrap();
        let (fourth, _) = store.remove_permission(id, Permission::BillView).unwrap();
        assert_eq!(third, PermissionChange::Removed);
        assert_eq!(fourth, PermissionChange::NoOp);
    }

    #[test]
    fn concurrent_grants_of_different_permissions_both_survive() {
        let store = Arc::new(InMemoryUserStore::new());
        let acct = account("e@example.com");
        let id = acct.id;
        store.insert(acct).unwrap();

        let grants = [Permission::BillView, Permission::PaymentView];
        let handles: Vec<_> = grants
            .into_iter()
            .map(|p| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.add_permission(id, p).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let acct = store.find_by_id(id).unwrap().unwrap();
        assert!(acct.permissions.contains(&Permission::BillView));
        assert!(acct.permissions.contains(&Permission::PaymentView));
    }

    #[test]
    fn concurrent_failed_logins_do_not_skip_the_threshold() {
        let store = Arc::new(InMemoryUserStore::new());
        let acct = account("f@example.com");
        let id = acct.id;
        store.insert(acct).unwrap();

        let now = chrono::Utc::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.update(id, |a| {
                        a.register_failed_login(now);
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }

        let acct = store.find_by_id(id).unwrap().unwrap();
        assert_eq!(acct.failed_login_attempts, 8);
        assert!(acct.is_locked(now));
    }
}
