//! Account orchestration: credential & lockout engine, OTP flows, user
//! lifecycle.
//!
//! Every operation here is a single logical flow per request; the only
//! shared-state coordination is what the [`UserStore`] atomicity contract
//! provides. Lock and OTP expiry are checked lazily at the moment of use.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};

use mesa_auth::{
    OtpError, PasswordError, Permission, PermissionChange, Principal, Role, RolePermissionMap,
    SessionClaims, TokenCodec, TokenError, UnknownPermission, UnknownRole, UserAccount,
    UserProfile, generate_otp_code, hash_password, verify_password,
};
use mesa_core::{DomainError, UserId};

use crate::delivery::OtpDelivery;
use crate::user_store::{StoreError, UserStore};

#[derive(Debug, Error)]
pub enum AccountError {
    /// Bad password *or* unknown email. One variant for both, so callers
    /// cannot probe which emails exist.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is deactivated, contact support")]
    AccountDeactivated,

    #[error("account not verified, complete OTP verification first")]
    AccountNotVerified,

    #[error("account temporarily locked after too many failed attempts, try again later")]
    AccountLocked,

    /// Used where account existence is already implied by context (OTP
    /// flows, user administration), so hiding it would buy nothing.
    #[error("account not found")]
    AccountNotFound,

    #[error("email already registered")]
    EmailTaken,

    #[error("admin accounts cannot be deleted")]
    AdminUndeletable,

    #[error("you cannot delete your own account")]
    SelfDeletion,

    #[error("cannot modify permissions of admin accounts")]
    AdminAccountProtected,

    #[error(transparent)]
    UnknownRole(#[from] UnknownRole),

    #[error(transparent)]
    UnknownPermission(#[from] UnknownPermission),

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("token failure: {0}")]
    Token(#[from] TokenError),

    #[error("storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AccountError::AccountNotFound,
            StoreError::EmailTaken => AccountError::EmailTaken,
            other => AccountError::Store(other),
        }
    }
}

/// Input for account creation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Role as submitted; normalized and validated against the closed set.
    pub role: String,
}

/// Successful login: a signed session token plus the safe user projection.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub token: String,
    pub user: UserProfile,
}

/// Result of an idempotent grant/revoke.
#[derive(Debug, Clone)]
pub struct PermissionOutcome {
    pub change: PermissionChange,
    pub user: UserProfile,
}

pub struct AccountService<S> {
    store: S,
    map: Arc<RolePermissionMap>,
    codec: Arc<dyn TokenCodec>,
    delivery: Arc<dyn OtpDelivery>,
    otp_ttl: Duration,
    token_ttl: Duration,
}

impl<S: UserStore> AccountService<S> {
    pub fn new(
        store: S,
        map: Arc<RolePermissionMap>,
        codec: Arc<dyn TokenCodec>,
        delivery: Arc<dyn OtpDelivery>,
        otp_ttl: Duration,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            map,
            codec,
            delivery,
            otp_ttl,
            token_ttl,
        }
    }

    pub fn role_map(&self) -> &RolePermissionMap {
        &self.map
    }

    // ─────────────────────────────────────────────────────────────────────
    // Account lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create an account with its role's default permissions and start the
    /// verification flow by issuing an OTP.
    pub fn create_user(
        &self,
        input: &NewUser,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, AccountError> {
        let role: Role = input.role.parse()?;
        let password_hash = hash_password(&input.password)?;
        let account = UserAccount::new(
            UserId::new(),
            &input.name,
            &input.email,
            password_hash,
            role,
            &self.map,
        )?;

        let id = account.id;
        let email = account.email.clone();
        let profile = account.profile();
        self.store.insert(account)?;
        info!(user_id = %id, %role, "user created");

        self.issue_and_send_otp(id, &email, now)?;
        Ok(profile)
    }

    /// Idempotently seed the platform's system admin account.
    ///
    /// System accounts are verified from the start, flagged so listings skip
    /// them, and never created twice for the same email.
    pub fn seed_system_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, AccountError> {
        let normalized = email.trim().to_lowercase();
        if self.store.find_by_email(&normalized)?.is_some() {
            return Ok(None);
        }

        let password_hash = hash_password(password)?;
        let mut account = UserAccount::new(
            UserId::new(),
            name,
            email,
            password_hash,
            Role::Admin,
            &self.map,
        )?;
        account.is_verified = true;
        account.system_account = true;

        let profile = account.profile();
        self.store.insert(account)?;
        info!(user_id = %profile.id, "system admin seeded");
        Ok(Some(profile))
    }

    /// Safe user listing: no credential/lockout fields, system accounts and
    /// the requesting user excluded.
    pub fn list_users(&self, exclude: Option<UserId>) -> Result<Vec<UserProfile>, AccountError> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|a| !a.system_account && Some(a.id) != exclude)
            .map(|a| a.profile())
            .collect())
    }

    /// Change a user's role, replacing their permission set with the new
    /// role's defaults. Custom grants do not survive the change.
    pub fn change_role(&self, target: UserId, role: &str) -> Result<UserProfile, AccountError> {
        let role: Role = role.parse()?;
        let updated = self.store.update(target, |a| a.change_role(role, &self.map))?;
        info!(user_id = %target, %role, "role changed, permissions reset to role defaults");
        Ok(updated.profile())
    }

    /// Grant a single permission. The token is validated against the catalog
    /// before any state is touched.
    pub fn grant_permission(
        &self,
        actor: &Principal,
        target: UserId,
        token: &str,
    ) -> Result<PermissionOutcome, AccountError> {
        let permission: Permission = token.parse()?;
        self.guard_admin_target(actor, target)?;

        let (change, updated) = self.store.add_permission(target, permission)?;
        if !change.is_noop() {
            info!(user_id = %target, %permission, "permission granted");
        }
        Ok(PermissionOutcome {
            change,
            user: updated.profile(),
        })
    }

    /// Revoke a single permission. Idempotent; absent permissions report a
    /// no-op.
    pub fn revoke_permission(
        &self,
        actor: &Principal,
        target: UserId,
        token: &str,
    ) -> Result<PermissionOutcome, AccountError> {
        let permission: Permission = token.parse()?;
        self.guard_admin_target(actor, target)?;

        let (change, updated) = self.store.remove_permission(target, permission)?;
        if !change.is_noop() {
            info!(user_id = %target, %permission, "permission revoked");
        }
        Ok(PermissionOutcome {
            change,
            user: updated.profile(),
        })
    }

    /// Delete an account. Admin accounts are undeletable, and an actor may
    /// never delete themselves, regardless of permissions.
    pub fn delete_user(&self, actor: &Principal, target: UserId) -> Result<(), AccountError> {
        let account = self
            .store
            .find_by_id(target)?
            .ok_or(AccountError::AccountNotFound)?;

        if account.role.is_admin() {
            return Err(AccountError::AdminUndeletable);
        }
        if actor.user_id == target {
            return Err(AccountError::SelfDeletion);
        }

        self.store.delete(target)?;
        info!(user_id = %target, actor = %actor.user_id, "user deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Credential & lockout engine
    // ─────────────────────────────────────────────────────────────────────

    /// Validate credentials and issue a session token.
    ///
    /// Precondition order is fixed: existence, active, verified, lock state,
    /// then the password itself. A failed comparison increments the counter
    /// atomically and locks the account at the threshold; a success clears
    /// any stale counter or expired lock (lazy expiry).
    pub fn login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginSuccess, AccountError> {
        let email = email.trim().to_lowercase();
        let Some(account) = self.store.find_by_email(&email)? else {
            return Err(AccountError::InvalidCredentials);
        };

        if !account.is_active {
            return Err(AccountError::AccountDeactivated);
        }
        if !account.is_verified {
            return Err(AccountError::AccountNotVerified);
        }
        if account.is_locked(now) {
            warn!(user_id = %account.id, "login attempt on locked account");
            return Err(AccountError::AccountLocked);
        }

        if !verify_password(password, &account.password_hash)? {
            let mut locked_until = None;
            self.store.update(account.id, |a| {
                locked_until = a.register_failed_login(now);
            })?;
            if let Some(until) = locked_until {
                warn!(user_id = %account.id, %until, "account locked after repeated failed logins");
            }
            return Err(AccountError::InvalidCredentials);
        }

        let updated = self.store.update(account.id, |a| {
            a.register_successful_login(now);
        })?;

        let claims = SessionClaims::for_account(&updated, now, self.token_ttl);
        let token = self.codec.encode(&claims)?;
        info!(user_id = %updated.id, "login succeeded");

        Ok(LoginSuccess {
            token,
            user: updated.profile(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // OTP verification & reset flow
    // ─────────────────────────────────────────────────────────────────────

    /// Consume a verification code and mark the account verified.
    pub fn verify_account(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, AccountError> {
        let account = self.find_by_email_required(email)?;

        let verified: Result<UserProfile, OtpError> = self.store.try_update(account.id, |a| {
            a.consume_otp(code, now)?;
            a.is_verified = true;
            Ok(a.profile())
        })?;
        let profile = verified?;

        info!(user_id = %profile.id, "account verified");
        Ok(profile)
    }

    /// Start the password-reset flow by issuing a fresh OTP.
    pub fn forgot_password(&self, email: &str, now: DateTime<Utc>) -> Result<(), AccountError> {
        let account = self.find_by_email_required(email)?;
        self.issue_and_send_otp(account.id, &account.email, now)
    }

    /// Re-issue the current flow's OTP (overwrites the previous code).
    pub fn resend_otp(&self, email: &str, now: DateTime<Utc>) -> Result<(), AccountError> {
        let account = self.find_by_email_required(email)?;
        self.issue_and_send_otp(account.id, &account.email, now)
    }

    /// Set a new password, gated on a live OTP.
    ///
    /// The OTP check is done here again rather than trusting an earlier
    /// `verify` call: the code is consumed at the moment the password
    /// actually changes.
    pub fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let account = self.find_by_email_required(email)?;
        let password_hash = hash_password(new_password)?;

        let reset: Result<(), OtpError> = self.store.try_update(account.id, move |a| {
            a.consume_otp(code, now)?;
            a.password_hash = password_hash;
            Ok(())
        })?;
        reset?;

        info!(user_id = %account.id, "password reset");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    fn find_by_email_required(&self, email: &str) -> Result<UserAccount, AccountError> {
        let normalized = email.trim().to_lowercase();
        self.store
            .find_by_email(&normalized)?
            .ok_or(AccountError::AccountNotFound)
    }

    fn issue_and_send_otp(
        &self,
        id: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let code = generate_otp_code();
        self.store
            .update(id, |a| a.issue_otp(code.clone(), now, self.otp_ttl))?;

        // Fire-and-forget: issuance is already persisted.
        self.delivery.deliver(email, &code);
        info!(user_id = %id, "OTP issued");
        Ok(())
    }

    fn guard_admin_target(&self, actor: &Principal, target: UserId) -> Result<(), AccountError> {
        let account = self
            .store
            .find_by_id(target)?
            .ok_or(AccountError::AccountNotFound)?;
        if account.role.is_admin() && !actor.role.is_admin() {
            return Err(AccountError::AdminAccountProtected);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryUserStore;
    use mesa_auth::{Hs256TokenCodec, MAX_FAILED_LOGIN_ATTEMPTS};
    use std::sync::Mutex;

    /// Delivery stub that records issued codes so tests can use them.
    #[derive(Default)]
    struct CapturingDelivery {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl CapturingDelivery {
        fn last_code_for(&self, email: &str) -> String {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(to, _)| to == email)
                .map(|(_, code)| code.clone())
                .expect("no OTP sent to that address")
        }
    }

    impl OtpDelivery for CapturingDelivery {
        fn deliver(&self, email: &str, code: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), code.to_string()));
        }
    }

    struct Harness {
        svc: AccountService<InMemoryUserStore>,
        delivery: Arc<CapturingDelivery>,
        codec: Arc<Hs256TokenCodec>,
    }

    fn harness() -> Harness {
        let delivery = Arc::new(CapturingDelivery::default());
        let codec = Arc::new(Hs256TokenCodec::new(b"test-secret"));
        let svc = AccountService::new(
            InMemoryUserStore::new(),
            Arc::new(RolePermissionMap::builtin().unwrap()),
            codec.clone(),
            delivery.clone(),
            Duration::seconds(300),
            Duration::days(1),
        );
        Harness {
            svc,
            delivery,
            codec,
        }
    }

    fn new_user(email: &str, role: &str) -> NewUser {
        NewUser {
            name: "Test User".into(),
            email: email.into(),
            password: "hunter2-hunter2".into(),
            role: role.into(),
        }
    }

    /// Create + OTP-verify an account, returning its profile.
    fn create_verified(h: &Harness, email: &str, role: &str) -> UserProfile {
        let now = Utc::now();
        h.svc.create_user(&new_user(email, role), now).unwrap();
        let code = h.delivery.last_code_for(email);
        h.svc.verify_account(email, &code, now).unwrap()
    }

    fn admin_principal() -> Principal {
        Principal {
            user_id: UserId::new(),
            email: "root@example.com".into(),
            role: Role::Admin,
            permissions: RolePermissionMap::all_permissions(),
        }
    }

    fn principal_of(profile: &UserProfile) -> Principal {
        Principal {
            user_id: profile.id,
            email: profile.email.clone(),
            role: profile.role,
            permissions: profile.permissions.clone(),
        }
    }

    #[test]
    fn unverified_accounts_cannot_login() {
        let h = harness();
        let now = Utc::now();
        h.svc
            .create_user(&new_user("w@example.com", "waiter"), now)
            .unwrap();

        assert!(matches!(
            h.svc.login("w@example.com", "hunter2-hunter2", now),
            Err(AccountError::AccountNotVerified)
        ));
    }

    #[test]
    fn verification_flow_enables_login() {
        let h = harness();
        let now = Utc::now();
        create_verified(&h, "w@example.com", "waiter");

        let success = h.svc.login("w@example.com", "hunter2-hunter2", now).unwrap();
        assert_eq!(success.user.role, Role::Waiter);

        let claims = h.codec.decode(&success.token, now).unwrap();
        assert_eq!(claims.sub, success.user.id);
        assert!(claims.permissions.contains(&Permission::OrderCreate));
    }

    #[test]
    fn unknown_email_and_wrong_password_are_indistinguishable() {
        let h = harness();
        let now = Utc::now();
        create_verified(&h, "w@example.com", "waiter");

        let unknown = h.svc.login("ghost@example.com", "whatever-pw", now);
        let wrong = h.svc.login("w@example.com", "wrong-password", now);

        assert!(matches!(unknown, Err(AccountError::InvalidCredentials)));
        assert!(matches!(wrong, Err(AccountError::InvalidCredentials)));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let h = harness();
        let now = Utc::now();
        h.svc
            .create_user(&new_user("dup@example.com", "waiter"), now)
            .unwrap();
        assert!(matches!(
            h.svc.create_user(&new_user("dup@example.com", "kitchen"), now),
            Err(AccountError::EmailTaken)
        ));
    }

    #[test]
    fn unknown_role_is_rejected_before_any_state_change() {
        let h = harness();
        assert!(matches!(
            h.svc.create_user(&new_user("x@example.com", "sommelier"), Utc::now()),
            Err(AccountError::UnknownRole(_))
        ));
        assert!(h.svc.list_users(None).unwrap().is_empty());
    }

    #[test]
    fn lockout_after_five_failures_and_recovery_after_the_window() {
        let h = harness();
        let t0 = Utc::now();
        create_verified(&h, "w@example.com", "waiter");

        for _ in 0..MAX_FAILED_LOGIN_ATTEMPTS {
            assert!(matches!(
                h.svc.login("w@example.com", "wrong-password", t0),
                Err(AccountError::InvalidCredentials)
            ));
        }

        // Sixth attempt with *correct* credentials inside the window.
        assert!(matches!(
            h.svc.login("w@example.com", "hunter2-hunter2", t0),
            Err(AccountError::AccountLocked)
        ));

        // After the window the lock expires lazily and the counter resets.
        let later = t0 + Duration::minutes(16);
        let success = h.svc.login("w@example.com", "hunter2-hunter2", later).unwrap();

        let stored = h.svc.store.find_by_id(success.user.id).unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert_eq!(stored.lock_until, None);
    }

    #[test]
    fn locked_account_does_not_advance_the_counter() {
        let h = harness();
        let t0 = Utc::now();
        let profile = create_verified(&h, "w@example.com", "waiter");

        for _ in 0..MAX_FAILED_LOGIN_ATTEMPTS {
            let _ = h.svc.login("w@example.com", "wrong-password", t0);
        }
        let _ = h.svc.login("w@example.com", "wrong-password", t0);

        // The attempt during the lock window was rejected before the
        // comparison, so the persisted counter is still at the threshold.
        let stored = h.svc.store.find_by_id(profile.id).unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, MAX_FAILED_LOGIN_ATTEMPTS);
    }

    #[test]
    fn otp_reissue_invalidates_the_previous_code() {
        let h = harness();
        let now = Utc::now();
        h.svc
            .create_user(&new_user("w@example.com", "waiter"), now)
            .unwrap();
        let first = h.delivery.last_code_for("w@example.com");

        h.svc.resend_otp("w@example.com", now).unwrap();
        let second = h.delivery.last_code_for("w@example.com");

        if first != second {
            assert!(matches!(
                h.svc.verify_account("w@example.com", &first, now),
                Err(AccountError::Otp(OtpError::InvalidOrExpired))
            ));
        }
        h.svc.verify_account("w@example.com", &second, now).unwrap();
    }

    #[test]
    fn otp_expires_after_its_ttl() {
        let h = harness();
        let now = Utc::now();
        h.svc
            .create_user(&new_user("w@example.com", "waiter"), now)
            .unwrap();
        let code = h.delivery.last_code_for("w@example.com");

        let late = now + Duration::seconds(301);
        assert!(matches!(
            h.svc.verify_account("w@example.com", &code, late),
            Err(AccountError::Otp(OtpError::InvalidOrExpired))
        ));
    }

    #[test]
    fn password_reset_consumes_the_otp_and_changes_the_password() {
        let h = harness();
        let now = Utc::now();
        create_verified(&h, "w@example.com", "waiter");

        h.svc.forgot_password("w@example.com", now).unwrap();
        let code = h.delivery.last_code_for("w@example.com");

        h.svc
            .reset_password("w@example.com", &code, "new-password-1", now)
            .unwrap();

        // Single use: the same code cannot reset again.
        assert!(matches!(
            h.svc
                .reset_password("w@example.com", &code, "new-password-2", now),
            Err(AccountError::Otp(OtpError::InvalidOrExpired))
        ));

        assert!(matches!(
            h.svc.login("w@example.com", "hunter2-hunter2", now),
            Err(AccountError::InvalidCredentials)
        ));
        assert!(h.svc.login("w@example.com", "new-password-1", now).is_ok());
    }

    #[test]
    fn otp_flows_admit_account_existence() {
        let h = harness();
        assert!(matches!(
            h.svc.forgot_password("ghost@example.com", Utc::now()),
            Err(AccountError::AccountNotFound)
        ));
    }

    #[test]
    fn grant_and_revoke_round_trip_with_noop_reporting() {
        let h = harness();
        let profile = create_verified(&h, "w@example.com", "waiter");
        let actor = admin_principal();

        let granted = h
            .svc
            .grant_permission(&actor, profile.id, "bill:view")
            .unwrap();
        assert_eq!(granted.change, PermissionChange::Added);
        assert!(granted.user.permissions.contains(&Permission::BillView));

        let again = h
            .svc
            .grant_permission(&actor, profile.id, "bill:view")
            .unwrap();
        assert_eq!(again.change, PermissionChange::NoOp);

        let revoked = h
            .svc
            .revoke_permission(&actor, profile.id, "bill:view")
            .unwrap();
        assert_eq!(revoked.change, PermissionChange::Removed);

        let absent = h
            .svc
            .revoke_permission(&actor, profile.id, "bill:view")
            .unwrap();
        assert_eq!(absent.change, PermissionChange::NoOp);
    }

    #[test]
    fn unknown_permission_token_is_rejected_before_mutation() {
        let h = harness();
        let profile = create_verified(&h, "w@example.com", "waiter");
        let actor = admin_principal();

        assert!(matches!(
            h.svc.grant_permission(&actor, profile.id, "order:delete"),
            Err(AccountError::UnknownPermission(_))
        ));
        let stored = h.svc.store.find_by_id(profile.id).unwrap().unwrap();
        assert_eq!(&stored.permissions, h.svc.role_map().defaults(Role::Waiter));
    }

    #[test]
    fn non_admin_cannot_touch_admin_permissions() {
        let h = harness();
        let admin = h
            .svc
            .seed_system_admin("Root", "root@example.com", "super-secret-pw")
            .unwrap()
            .unwrap();
        let manager = create_verified(&h, "m@example.com", "manager");

        let err = h
            .svc
            .grant_permission(&principal_of(&manager), admin.id, "order:view")
            .unwrap_err();
        assert!(matches!(err, AccountError::AdminAccountProtected));
    }

    #[test]
    fn role_change_resets_permissions_to_new_defaults() {
        let h = harness();
        let profile = create_verified(&h, "k@example.com", "kitchen");
        let actor = admin_principal();

        h.svc
            .grant_permission(&actor, profile.id, "product:delete")
            .unwrap();

        let updated = h.svc.change_role(profile.id, "waiter").unwrap();
        assert_eq!(updated.role, Role::Waiter);
        assert!(!updated.permissions.contains(&Permission::ProductDelete));
        assert_eq!(&updated.permissions, h.svc.role_map().defaults(Role::Waiter));
    }

    #[test]
    fn admin_accounts_and_self_cannot_be_deleted() {
        let h = harness();
        let admin = h
            .svc
            .seed_system_admin("Root", "root@example.com", "super-secret-pw")
            .unwrap()
            .unwrap();
        let waiter = create_verified(&h, "w@example.com", "waiter");

        // Another admin as target: rejected.
        assert!(matches!(
            h.svc.delete_user(&admin_principal(), admin.id),
            Err(AccountError::AdminUndeletable)
        ));

        // Self-deletion: rejected even for non-admins.
        assert!(matches!(
            h.svc.delete_user(&principal_of(&waiter), waiter.id),
            Err(AccountError::SelfDeletion)
        ));

        // A regular target deleted by someone else works.
        h.svc.delete_user(&admin_principal(), waiter.id).unwrap();
        assert!(h.svc.store.find_by_id(waiter.id).unwrap().is_none());
    }

    #[test]
    fn listings_exclude_system_accounts_and_the_requester() {
        let h = harness();
        h.svc
            .seed_system_admin("Root", "root@example.com", "super-secret-pw")
            .unwrap();
        let a = create_verified(&h, "a@example.com", "waiter");
        create_verified(&h, "b@example.com", "cashier");

        let listed = h.svc.list_users(Some(a.id)).unwrap();
        let emails: Vec<_> = listed.iter().map(|p| p.email.as_str()).collect();
        assert_eq!(emails, vec!["b@example.com"]);
    }

    #[test]
    fn seeding_is_idempotent() {
        let h = harness();
        assert!(h
            .svc
            .seed_system_admin("Root", "root@example.com", "super-secret-pw")
            .unwrap()
            .is_some());
        assert!(h
            .svc
            .seed_system_admin("Root", "root@example.com", "super-secret-pw")
            .unwrap()
            .is_none());
    }

    #[test]
    fn issued_tokens_are_snapshots_not_live_views() {
        let h = harness();
        let now = Utc::now();
        let profile = create_verified(&h, "w@example.com", "waiter");
        let actor = admin_principal();

        let success = h.svc.login("w@example.com", "hunter2-hunter2", now).unwrap();

        h.svc
            .grant_permission(&actor, profile.id, "bill:generate")
            .unwrap();

        // The already-issued token still carries the pre-grant snapshot.
        let claims = h.codec.decode(&success.token, now).unwrap();
        assert!(!claims.permissions.contains(&Permission::BillGenerate));

        // A fresh login observes the change.
        let fresh = h.svc.login("w@example.com", "hunter2-hunter2", now).unwrap();
        let claims = h.codec.decode(&fresh.token, now).unwrap();
        assert!(claims.permissions.contains(&Permission::BillGenerate));
    }
}
