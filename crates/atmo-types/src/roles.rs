//! Account roles.
//!
//! Roles are stored as `role_id` integers on the `users` table and carried
//! in bearer-token claims. Admins may create readings and alerts and change
//! report status; everyone else is read-mostly.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A user's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Role {
    /// Full access.
    Admin,
    /// Read access to all monitoring data.
    Scientist,
    /// Default role for self-registered accounts.
    Citizen,
}

impl Role {
    /// The stored `role_id`.
    pub const fn id(self) -> i32 {
        match self {
            Self::Admin => 1,
            Self::Scientist => 2,
            Self::Citizen => 3,
        }
    }

    /// Look up a role by `role_id`.
    pub const fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::Admin),
            2 => Some(Self::Scientist),
            3 => Some(Self::Citizen),
            _ => None,
        }
    }

    /// Resolve the role label sent at registration.
    ///
    /// Only the exact labels `Admin` and `Scientist` are recognised;
    /// anything else, including a missing label, registers a citizen.
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("Admin") => Self::Admin,
            Some("Scientist") => Self::Scientist,
            _ => Self::Citizen,
        }
    }

    /// Whether this role may perform admin-only operations.
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_default_to_citizen() {
        assert_eq!(Role::from_label(Some("Admin")), Role::Admin);
        assert_eq!(Role::from_label(Some("Scientist")), Role::Scientist);
        assert_eq!(Role::from_label(Some("admin")), Role::Citizen);
        assert_eq!(Role::from_label(None), Role::Citizen);
    }

    #[test]
    fn ids_round_trip() {
        for role in [Role::Admin, Role::Scientist, Role::Citizen] {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(42), None);
    }

    #[test]
    fn only_admin_is_admin() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::Scientist.is_admin());
        assert!(!Role::Citizen.is_admin());
    }
}
