//! User, role and capability models
//!
//! Roles form a small capability lattice. Every mutating document operation takes
//! an explicit [`Actor`] and checks one of the predicates below before touching state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Roles a user can hold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    StockManager,
    StockKeeper,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Admin,
        Role::StockManager,
        Role::StockKeeper,
        Role::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::StockManager => "stock_manager",
            Role::StockKeeper => "stock_keeper",
            Role::Viewer => "viewer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "stock_manager" => Some(Role::StockManager),
            "stock_keeper" => Some(Role::StockKeeper),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    /// Any authenticated role may read
    pub fn can_view(&self) -> bool {
        true
    }

    pub fn can_modify_inventory(&self) -> bool {
        matches!(self, Role::Admin | Role::StockManager | Role::StockKeeper)
    }

    pub fn can_delete(&self) -> bool {
        matches!(self, Role::Admin | Role::StockManager)
    }

    pub fn can_approve_or_verify(&self) -> bool {
        matches!(self, Role::Admin | Role::StockManager)
    }

    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named capability, used where the capability is chosen at runtime (wasm, route guards)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    View,
    ModifyInventory,
    Delete,
    ApproveOrVerify,
    ManageUsers,
}

impl Capability {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Capability::View),
            "modify_inventory" => Some(Capability::ModifyInventory),
            "delete" => Some(Capability::Delete),
            "approve_or_verify" => Some(Capability::ApproveOrVerify),
            "manage_users" => Some(Capability::ManageUsers),
            _ => None,
        }
    }

    pub fn granted_to(&self, role: Role) -> bool {
        match self {
            Capability::View => role.can_view(),
            Capability::ModifyInventory => role.can_modify_inventory(),
            Capability::Delete => role.can_delete(),
            Capability::ApproveOrVerify => role.can_approve_or_verify(),
            Capability::ManageUsers => role.can_manage_users(),
        }
    }
}

/// The authenticated caller of an operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    /// Fail with `Forbidden` unless the role holds `capability`
    pub fn require(&self, capability: Capability, action: &str) -> DomainResult<()> {
        if capability.granted_to(self.role) {
            Ok(())
        } else {
            Err(DomainError::forbidden(format!(
                "role {} may not {}",
                self.role, action
            )))
        }
    }

    /// Fail with `Forbidden` unless the caller created the document
    pub fn require_owner(&self, owner_id: i64, action: &str) -> DomainResult<()> {
        if self.id == owner_id {
            Ok(())
        } else {
            Err(DomainError::forbidden(format!(
                "only the document owner may {}",
                action
            )))
        }
    }
}

/// A user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_lattice() {
        assert!(Role::ALL.iter().all(|r| r.can_view()));

        assert!(Role::StockKeeper.can_modify_inventory());
        assert!(!Role::Viewer.can_modify_inventory());

        assert!(Role::StockManager.can_approve_or_verify());
        assert!(!Role::StockKeeper.can_approve_or_verify());
        assert!(Role::StockManager.can_delete());
        assert!(!Role::StockKeeper.can_delete());

        assert!(Role::Admin.can_manage_users());
        assert!(!Role::StockManager.can_manage_users());
    }

    #[test]
    fn test_role_names() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("owner"), None);
    }

    #[test]
    fn test_require_yields_forbidden() {
        let viewer = Actor::new(7, Role::Viewer);
        let err = viewer
            .require(Capability::ModifyInventory, "create stock out")
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert!(viewer.require(Capability::View, "read").is_ok());
    }

    #[test]
    fn test_require_owner() {
        let admin = Actor::new(1, Role::Admin);
        assert!(admin.require_owner(1, "edit").is_ok());
        assert!(matches!(
            admin.require_owner(2, "edit"),
            Err(DomainError::Forbidden(_))
        ));
    }
}
