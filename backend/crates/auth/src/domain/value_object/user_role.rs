use serde::{Deserialize, Serialize};
use std::fmt;

/// Role id as stored in the `roles` table
///
/// Roles are data, not code: only the administrator id is fixed. Every other
/// id is a customer-facing role whose display name comes from the role cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRole(i16);

impl UserRole {
    pub const ADMIN: UserRole = UserRole(1);
    pub const CUSTOMER: UserRole = UserRole(2);

    #[inline]
    pub const fn from_id(id: i16) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(&self) -> i16 {
        self.0
    }

    #[inline]
    pub const fn is_admin(&self) -> bool {
        self.0 == Self::ADMIN.0
    }
}

impl Default for UserRole {
    fn default() -> Self {
        Self::CUSTOMER
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_checks() {
        assert!(UserRole::ADMIN.is_admin());
        assert!(!UserRole::CUSTOMER.is_admin());
        assert!(!UserRole::from_id(3).is_admin());
        assert_eq!(UserRole::default(), UserRole::CUSTOMER);
    }

    #[test]
    fn test_user_role_serializes_as_id() {
        assert_eq!(serde_json::to_string(&UserRole::ADMIN).unwrap(), "1");
        let role: UserRole = serde_json::from_str("3").unwrap();
        assert_eq!(role.id(), 3);
    }
}
