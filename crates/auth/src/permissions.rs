use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capability token of the form `resource:action`.
///
/// The catalog is closed and defined once here; nothing generates permission
/// tokens at runtime. Free-form strings from the outside world enter through
/// [`FromStr`], which normalizes and rejects anything outside the catalog
/// before it can reach stored state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "user:create")]
    UserCreate,
    #[serde(rename = "user:update")]
    UserUpdate,
    #[serde(rename = "user:view")]
    UserView,
    #[serde(rename = "user:delete")]
    UserDelete,

    #[serde(rename = "product:create")]
    ProductCreate,
    #[serde(rename = "product:update")]
    ProductUpdate,
    #[serde(rename = "product:view")]
    ProductView,
    #[serde(rename = "product:delete")]
    ProductDelete,

    #[serde(rename = "order:create")]
    OrderCreate,
    #[serde(rename = "order:update")]
    OrderUpdate,
    #[serde(rename = "order:view")]
    OrderView,
    #[serde(rename = "order:cancel")]
    OrderCancel,
    #[serde(rename = "order:status:update")]
    OrderStatusUpdate,

    #[serde(rename = "kitchen:view")]
    KitchenView,
    #[serde(rename = "kitchen:update")]
    KitchenUpdate,

    #[serde(rename = "bill:generate")]
    BillGenerate,
    #[serde(rename = "bill:view")]
    BillView,

    #[serde(rename = "payment:process")]
    PaymentProcess,
    #[serde(rename = "payment:view")]
    PaymentView,

    #[serde(rename = "table:assign")]
    TableAssign,
    #[serde(rename = "table:manage")]
    TableManage,
    #[serde(rename = "table:view")]
    TableView,
}

/// A permission token outside the catalog. Rejected before any state change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission: '{0}'")]
pub struct UnknownPermission(pub String);

impl Permission {
    /// The full catalog, in a stable order.
    pub const CATALOG: [Permission; 22] = [
        Permission::UserCreate,
        Permission::UserUpdate,
        Permission::UserView,
        Permission::UserDelete,
        Permission::ProductCreate,
        Permission::ProductUpdate,
        Permission::ProductView,
        Permission::ProductDelete,
        Permission::OrderCreate,
        Permission::OrderUpdate,
        Permission::OrderView,
        Permission::OrderCancel,
        Permission::OrderStatusUpdate,
        Permission::KitchenView,
        Permission::KitchenUpdate,
        Permission::BillGenerate,
        Permission::BillView,
        Permission::PaymentProcess,
        Permission::PaymentView,
        Permission::TableAssign,
        Permission::TableManage,
        Permission::TableView,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::UserCreate => "user:create",
            Permission::UserUpdate => "user:update",
            Permission::UserView => "user:view",
            Permission::UserDelete => "user:delete",
            Permission::ProductCreate => "product:create",
            Permission::ProductUpdate => "product:update",
            Permission::ProductView => "product:view",
            Permission::ProductDelete => "product:delete",
            Permission::OrderCreate => "order:create",
            Permission::OrderUpdate => "order:update",
            Permission::OrderView => "order:view",
            Permission::OrderCancel => "order:cancel",
            Permission::OrderStatusUpdate => "order:status:update",
            Permission::KitchenView => "kitchen:view",
            Permission::KitchenUpdate => "kitchen:update",
            Permission::BillGenerate => "bill:generate",
            Permission::BillView => "bill:view",
            Permission::PaymentProcess => "payment:process",
            Permission::PaymentView => "payment:view",
            Permission::TableAssign => "table:assign",
            Permission::TableManage => "table:manage",
            Permission::TableView => "table:view",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    /// Parses a permission from its wire form, normalizing case and
    /// whitespace. Tokens outside the catalog are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Permission::CATALOG
            .iter()
            .find(|p| p.as_str() == normalized)
            .copied()
            .ok_or(UnknownPermission(normalized))
    }
}
