//! User Status Value Object
//!
//! Only `Active` accounts may authenticate. Inactive and suspended accounts
//! keep their data and sessions are refused at sign-in and refresh.

use serde::{Deserialize, Serialize};
use std::fmt;

/// User account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i16)]
pub enum UserStatus {
    /// Normal account
    #[default]
    Active = 1,

    /// Never activated or deactivated by the user
    Inactive = 2,

    /// Suspended by an administrator
    Suspended = 3,
}

impl UserStatus {
    /// Get numeric ID for database storage
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    /// Get string code for serialization/API
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }

    /// Check if login is allowed
    #[inline]
    pub const fn can_login(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Create from numeric ID
    #[inline]
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::Active),
            2 => Some(Self::Inactive),
            3 => Some(Self::Suspended),
            _ => None,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_status_from_id() {
        assert_eq!(UserStatus::from_id(1), Some(UserStatus::Active));
        assert_eq!(UserStatus::from_id(2), Some(UserStatus::Inactive));
        assert_eq!(UserStatus::from_id(3), Some(UserStatus::Suspended));
        assert_eq!(UserStatus::from_id(0), None);
        assert_eq!(UserStatus::from_id(4), None);
    }

    #[test]
    fn test_only_active_can_login() {
        assert!(UserStatus::Active.can_login());
        assert!(!UserStatus::Inactive.can_login());
        assert!(!UserStatus::Suspended.can_login());
    }

    #[test]
    fn test_id_roundtrip() {
        for status in [UserStatus::Active, UserStatus::Inactive, UserStatus::Suspended] {
            assert_eq!(UserStatus::from_id(status.id()), Some(status));
        }
    }
}
