//! API Scope
//!
//! Role tier granted to a calling service (storefront, admin console).
//! Carried as the `role` claim of the API-scope token.

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum ApiScope {
    #[display("admin")]
    Admin,
    #[display("user")]
    User,
}

impl ApiScope {
    #[inline]
    pub const fn id(&self) -> i16 {
        match self {
            Self::Admin => 1,
            Self::User => 2,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::Admin),
            2 => Some(Self::User),
            _ => None,
        }
    }
}

impl From<ApiScope> for i16 {
    fn from(scope: ApiScope) -> Self {
        scope.id()
    }
}

impl std::str::FromStr for ApiScope {
    type Err = String;

    /// Accepts `admin` / `user` or the numeric id
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "1" => Ok(Self::Admin),
            "user" | "2" => Ok(Self::User),
            other => Err(format!("unknown api scope: {other}")),
        }
    }
}

impl TryFrom<i16> for ApiScope {
    type Error = String;

    fn try_from(id: i16) -> Result<Self, Self::Error> {
        ApiScope::from_id(id).ok_or_else(|| format!("unknown api scope: {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_ids() {
        assert_eq!(ApiScope::Admin.id(), 1);
        assert_eq!(ApiScope::User.id(), 2);
        assert_eq!(ApiScope::from_id(2), Some(ApiScope::User));
        assert_eq!(ApiScope::from_id(3), None);
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("Admin".parse::<ApiScope>(), Ok(ApiScope::Admin));
        assert_eq!("2".parse::<ApiScope>(), Ok(ApiScope::User));
        assert!("root".parse::<ApiScope>().is_err());
    }

    #[test]
    fn test_scope_serde_as_number() {
        assert_eq!(serde_json::to_string(&ApiScope::Admin).unwrap(), "1");
        assert_eq!(serde_json::from_str::<ApiScope>("2").unwrap(), ApiScope::User);
        assert!(serde_json::from_str::<ApiScope>("9").is_err());
        assert_eq!(ApiScope::User.to_string(), "user");
    }
}
