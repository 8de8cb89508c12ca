use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role used for RBAC.
///
/// Roles are a closed set: adding one is a code change, which keeps the
/// role→permission table total and checkable at startup instead of at
/// request time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Waiter,
    Kitchen,
    Cashier,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role: '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    /// Every declared role, in a stable order.
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Manager,
        Role::Waiter,
        Role::Kitchen,
        Role::Cashier,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Waiter => "waiter",
            Role::Kitchen => "kitchen",
            Role::Cashier => "cashier",
        }
    }

    /// Admin bypasses permission checks entirely (see `authorize`).
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Parses a role from its wire form, normalizing case and whitespace
    /// (`" Waiter "` → `Role::Waiter`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "waiter" => Ok(Role::Waiter),
            "kitchen" => Ok(Role::Kitchen),
            "cashier" => Ok(Role::Cashier),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
