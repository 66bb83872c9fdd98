//! Actor roles.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three actors that observe and mutate orders.
///
/// Sessions carry roles as strings issued by the auth flow (`ROLE_ADMIN`,
/// `ROLE_DRIVER`, `ROLE_CUSTOMER`); this enum is the typed view of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Places orders and may cancel its own early orders.
    Customer,
    /// Confirms orders and assigns drivers.
    Admin,
    /// Moves assigned orders through preparation and delivery.
    Driver,
}

/// Error returned when a role string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

impl Role {
    /// The role string the auth flow grants for this role.
    #[must_use]
    pub const fn authority(self) -> &'static str {
        match self {
            Self::Customer => "ROLE_CUSTOMER",
            Self::Admin => "ROLE_ADMIN",
            Self::Driver => "ROLE_DRIVER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
            Self::Driver => write!(f, "driver"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    /// Accepts both the short form (`admin`) and the authority form
    /// (`ROLE_ADMIN`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("role_").unwrap_or(&lower);
        match name {
            "customer" | "user" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            "driver" => Ok(Self::Driver),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_and_authority_forms() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("ROLE_DRIVER".parse::<Role>().unwrap(), Role::Driver);
        assert_eq!("ROLE_USER".parse::<Role>().unwrap(), Role::Customer);
        assert!("ROLE_CHEF".parse::<Role>().is_err());
    }

    #[test]
    fn test_authority_roundtrips() {
        for role in [Role::Customer, Role::Admin, Role::Driver] {
            assert_eq!(role.authority().parse::<Role>().unwrap(), role);
        }
    }
}
