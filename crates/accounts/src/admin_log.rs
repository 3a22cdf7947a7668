//! Admin audit trail.
//!
//! Entries are immutable once built: there are no setters, and the store only
//! ever appends them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{AdminLogId, Entity, UserId};

/// Who performed a privileged change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum AuditActor {
    Admin(UserId),
    /// The scheduled sweep.
    System,
}

/// Kind of privileged change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminAction {
    ApproveUser,
    RejectUser,
    GrantTrial,
    PublishPlan,
    RetirePlan,
    ExpireSubscription,
    ToggleListing,
    CloseRfq,
    SettleTransaction,
}

impl AdminAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AdminAction::ApproveUser => "APPROVE_USER",
            AdminAction::RejectUser => "REJECT_USER",
            AdminAction::GrantTrial => "GRANT_TRIAL",
            AdminAction::PublishPlan => "PUBLISH_PLAN",
            AdminAction::RetirePlan => "RETIRE_PLAN",
            AdminAction::ExpireSubscription => "EXPIRE_SUBSCRIPTION",
            AdminAction::ToggleListing => "TOGGLE_LISTING",
            AdminAction::CloseRfq => "CLOSE_RFQ",
            AdminAction::SettleTransaction => "SETTLE_TRANSACTION",
        }
    }
}

impl core::fmt::Display for AdminAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit entry.
///
/// `target_user` may point at an account that no longer exists (rejections);
/// `detail` then carries the snapshot taken before deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminLog {
    id: AdminLogId,
    actor: AuditActor,
    action: AdminAction,
    target_user: Option<UserId>,
    detail: String,
    created_at: DateTime<Utc>,
}

impl AdminLog {
    pub fn record(
        actor: AuditActor,
        action: AdminAction,
        target_user: Option<UserId>,
        detail: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AdminLogId::new(),
            actor,
            action,
            target_user,
            detail: detail.into(),
            created_at: now,
        }
    }

    pub fn id_typed(&self) -> AdminLogId {
        self.id
    }

    pub fn actor(&self) -> AuditActor {
        self.actor
    }

    pub fn action(&self) -> AdminAction {
        self.action
    }

    pub fn target_user(&self) -> Option<UserId> {
        self.target_user
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for AdminLog {
    type Id = AdminLogId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_captures_fields() {
        let admin = UserId::new();
        let target = UserId::new();
        let now = Utc::now();
        let entry = AdminLog::record(
            AuditActor::Admin(admin),
            AdminAction::RejectUser,
            Some(target),
            "email=seller@example.com role=SELLER",
            now,
        );
        assert_eq!(entry.actor(), AuditActor::Admin(admin));
        assert_eq!(entry.action().to_string(), "REJECT_USER");
        assert_eq!(entry.target_user(), Some(target));
        assert!(entry.detail().contains("seller@example.com"));
        assert_eq!(entry.created_at(), now);
    }
}
