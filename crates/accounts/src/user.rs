//! Marketplace account and its approval state machine.
//!
//! Seller-capable accounts (`SELLER`, `BOTH`) start PENDING and wait for an
//! administrator: approval flips `is_approved`, rejection consumes the account
//! and leaves only an [`AccountSnapshot`] behind for the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_auth::{Principal, Role};
use bazaar_billing::PlanTier;
use bazaar_core::{DomainError, DomainResult, Entity, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Approval State
// ─────────────────────────────────────────────────────────────────────────────

/// Where an account stands in the approval workflow.
///
/// There is no stored `Rejected` state: rejection deletes the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalState {
    Pending,
    Approved,
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration Input
// ─────────────────────────────────────────────────────────────────────────────

/// Validated-on-construction signup data (credentials are handled by `Identity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    /// Plan tier the seller said they were interested in at signup.
    pub seller_plan: Option<PlanTier>,
}

// ─────────────────────────────────────────────────────────────────────────────
// User Entity
// ─────────────────────────────────────────────────────────────────────────────

/// Marketplace account.
///
/// # Invariants
/// - Email is stored trimmed and lowercased.
/// - BUYER and ADMIN accounts are approved from creation.
/// - Approval is one-way; an approved account never returns to pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub is_approved: bool,
    pub seller_plan: Option<PlanTier>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What remains of an account after rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
}

impl User {
    /// Self-service registration. Administrators cannot be created this way.
    pub fn register(id: UserId, new: NewUser, now: DateTime<Utc>) -> DomainResult<Self> {
        if new.role.is_admin() {
            return Err(DomainError::validation("administrator accounts cannot self-register"));
        }
        if new.seller_plan.is_some() && !new.role.can_sell() {
            return Err(DomainError::validation("only seller accounts can choose a seller plan"));
        }
        Self::build(id, new, now)
    }

    /// Bootstrap an administrator account (operator tooling, not signup).
    pub fn administrator(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Self::build(
            id,
            NewUser {
                name: name.into(),
                email: email.into(),
                phone: "-".to_string(),
                role: Role::Admin,
                seller_plan: None,
            },
            now,
        )
    }

    fn build(id: UserId, new: NewUser, now: DateTime<Utc>) -> DomainResult<Self> {
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if new.email.trim().is_empty() || !new.email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if new.phone.trim().is_empty() {
            return Err(DomainError::validation("phone cannot be empty"));
        }

        Ok(Self {
            id,
            name: new.name.trim().to_string(),
            email: normalize_email(&new.email),
            phone: new.phone.trim().to_string(),
            role: new.role,
            is_approved: !new.role.requires_approval(),
            seller_plan: new.seller_plan,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn approval_state(&self) -> ApprovalState {
        if self.is_approved {
            ApprovalState::Approved
        } else {
            ApprovalState::Pending
        }
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.role)
    }

    fn ensure_pending(&self) -> DomainResult<()> {
        if !self.role.requires_approval() {
            return Err(DomainError::validation(format!(
                "{} accounts do not go through approval",
                self.role
            )));
        }
        if self.is_approved {
            return Err(DomainError::conflict("account is already approved"));
        }
        Ok(())
    }

    /// PENDING -> APPROVED.
    pub fn approve(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_pending()?;
        self.is_approved = true;
        self.updated_at = now;
        Ok(())
    }

    /// PENDING -> REJECTED (terminal). The caller deletes the account.
    pub fn reject(self) -> DomainResult<AccountSnapshot> {
        self.ensure_pending()?;
        Ok(self.snapshot())
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            user_id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }

    /// Approved account able to sell.
    pub fn ensure_active_seller(&self) -> DomainResult<()> {
        if !self.role.can_sell() {
            return Err(DomainError::unauthorized("account cannot sell"));
        }
        if !self.is_approved {
            return Err(DomainError::unauthorized("seller account is pending approval"));
        }
        Ok(())
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
