use serde::{Deserialize, Serialize};

use bazaar_core::UserId;

use crate::{AuthError, Role};

/// An authenticated actor for authorization decisions.
///
/// Construction is decoupled from transport: the engine builds a principal from
/// the verified identity and the stored account.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn require_buyer(&self) -> Result<(), AuthError> {
        if self.role.can_buy() {
            Ok(())
        } else {
            Err(AuthError::forbidden("buyer role required"))
        }
    }

    pub fn require_seller(&self) -> Result<(), AuthError> {
        if self.role.can_sell() {
            Ok(())
        } else {
            Err(AuthError::forbidden("seller role required"))
        }
    }

    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AuthError::forbidden("admin role required"))
        }
    }

    /// Admins may act on anything; everyone else only on their own records.
    pub fn require_self_or_admin(&self, owner: UserId) -> Result<(), AuthError> {
        if self.role.is_admin() || self.user_id == owner {
            Ok(())
        } else {
            Err(AuthError::forbidden("not the owner of this record"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_role_passes_buyer_and_seller_checks() {
        let p = Principal::new(UserId::new(), Role::Both);
        assert!(p.require_buyer().is_ok());
        assert!(p.require_seller().is_ok());
        assert_eq!(p.require_admin(), Err(AuthError::forbidden("admin role required")));
    }

    #[test]
    fn self_or_admin() {
        let owner = UserId::new();
        assert!(Principal::new(owner, Role::Seller).require_self_or_admin(owner).is_ok());
        assert!(Principal::new(UserId::new(), Role::Admin).require_self_or_admin(owner).is_ok());
        assert!(Principal::new(UserId::new(), Role::Seller).require_self_or_admin(owner).is_err());
    }
}
