//! Role→permission table.
//!
//! The table is built once at process start and validated before use: every
//! declared role must have a non-empty entry, and the admin entry must equal
//! the full catalog. Admin's bypass in the decision function is a fast path
//! over data that is already complete, so the two can never disagree.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::permissions::Permission;
use crate::roles::Role;

/// Total mapping from [`Role`] to its default permission set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissionMap {
    map: BTreeMap<Role, BTreeSet<Permission>>,
}

/// Startup-fatal configuration error in the role→permission table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("role '{0}' has no permission entry")]
    MissingRole(Role),

    #[error("role '{0}' has an empty permission set")]
    EmptyRole(Role),

    #[error("admin entry is missing {0} catalog permission(s)")]
    IncompleteAdmin(usize),
}

impl RolePermissionMap {
    /// The canonical table for the restaurant domain.
    pub fn builtin() -> Result<Self, CatalogError> {
        use Permission::*;

        let mut map: BTreeMap<Role, BTreeSet<Permission>> = BTreeMap::new();

        // Full access. The entry really contains everything; the check-time
        // admin shortcut is only an optimization over this data.
        map.insert(Role::Admin, Permission::CATALOG.into_iter().collect());

        map.insert(
            Role::Manager,
            [
                UserView,
                ProductView,
                ProductUpdate,
                OrderView,
                OrderUpdate,
                BillGenerate,
                BillView,
                PaymentProcess,
                PaymentView,
                TableManage,
                TableView,
            ]
            .into(),
        );

        map.insert(
            Role::Waiter,
            [OrderCreate, OrderView, TableAssign, TableView].into(),
        );

        map.insert(
            Role::Kitchen,
            [
                KitchenView,
                KitchenUpdate,
                OrderView,
                OrderStatusUpdate,
                ProductView,
            ]
            .into(),
        );

        map.insert(
            Role::Cashier,
            [BillGenerate, BillView, PaymentProcess, PaymentView, OrderView].into(),
        );

        Self::new(map)
    }

    /// Build a validated table from an explicit mapping.
    pub fn new(map: BTreeMap<Role, BTreeSet<Permission>>) -> Result<Self, CatalogError> {
        for role in Role::ALL {
            match map.get(&role) {
                None => return Err(CatalogError::MissingRole(role)),
                Some(set) if set.is_empty() => return Err(CatalogError::EmptyRole(role)),
                Some(_) => {}
            }
        }

        let admin = &map[&Role::Admin];
        let missing = Permission::CATALOG
            .iter()
            .filter(|p| !admin.contains(p))
            .count();
        if missing > 0 {
            return Err(CatalogError::IncompleteAdmin(missing));
        }

        Ok(Self { map })
    }

    /// Default permission set for a role.
    ///
    /// Total by construction: `new` rejects tables with missing entries.
    pub fn defaults(&self, role: Role) -> &BTreeSet<Permission> {
        &self.map[&role]
    }

    pub fn contains(&self, role: Role) -> bool {
        self.map.contains_key(&role)
    }

    /// Every permission token in the catalog.
    pub fn all_permissions() -> BTreeSet<Permission> {
        Permission::CATALOG.into_iter().collect()
    }
}
