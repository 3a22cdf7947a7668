use core::str::FromStr;

use serde::{Deserialize, Serialize};

use bazaar_core::DomainError;

/// Marketplace role of an account.
///
/// Capabilities are derived through predicates (`can_buy`, `can_sell`, ...) so that
/// callers never compare role names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Buyer,
    Seller,
    Both,
    Admin,
}

impl Role {
    pub fn can_buy(self) -> bool {
        matches!(self, Role::Buyer | Role::Both)
    }

    pub fn can_sell(self) -> bool {
        matches!(self, Role::Seller | Role::Both)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Seller-capable accounts wait for an administrator before they can trade.
    pub fn requires_approval(self) -> bool {
        self.can_sell()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Buyer => "BUYER",
            Role::Seller => "SELLER",
            Role::Both => "BOTH",
            Role::Admin => "ADMIN",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUYER" => Ok(Role::Buyer),
            "SELLER" => Ok(Role::Seller),
            "BOTH" => Ok(Role::Both),
            "ADMIN" => Ok(Role::Admin),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}
