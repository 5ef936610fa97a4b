//! User roles

use serde::{Deserialize, Serialize};

/// Role of an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Merchant,
    Driver,
    Admin,
}

impl UserRole {
    /// Database string representation
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Merchant => "merchant",
            Self::Driver => "driver",
            Self::Admin => "admin",
        }
    }

    /// Parse the database string representation
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "merchant" => Some(Self::Merchant),
            "driver" => Some(Self::Driver),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_roundtrip() {
        for role in [
            UserRole::Customer,
            UserRole::Merchant,
            UserRole::Driver,
            UserRole::Admin,
        ] {
            assert_eq!(UserRole::from_db(role.as_db()), Some(role));
        }
        assert_eq!(UserRole::from_db("superuser"), None);
    }

    #[test]
    fn test_is_admin() {
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Customer.is_admin());
        assert!(!UserRole::Merchant.is_admin());
        assert!(!UserRole::Driver.is_admin());
    }

    #[test]
    fn test_serde_repr() {
        assert_eq!(
            serde_json::to_string(&UserRole::Driver).unwrap(),
            "\"driver\""
        );
        let role: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, UserRole::Admin);
    }
}
