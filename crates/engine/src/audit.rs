//! Admin audit log: recording inside units of work and reading it back.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use bazaar_accounts::{AdminAction, AdminLog, AuditActor};
use bazaar_auth::Principal;
use bazaar_core::UserId;
use bazaar_infra::{Store, UnitOfWork};

use crate::error::ServiceResult;

/// Append one audit entry as part of the caller's unit of work.
pub(crate) fn record_in(
    uow: &mut dyn UnitOfWork,
    actor: AuditActor,
    action: AdminAction,
    target_user: Option<UserId>,
    detail: impl Into<String>,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    uow.append_admin_log(AdminLog::record(actor, action, target_user, detail, now))?;
    Ok(())
}

/// Read side of the audit trail.
pub struct AdminAudit<S> {
    store: Arc<S>,
}

impl<S: Store> AdminAudit<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Every entry, oldest first. Admin only.
    pub fn entries(&self, principal: &Principal) -> ServiceResult<Vec<AdminLog>> {
        principal.require_admin()?;
        Ok(self.store.read(|uow| uow.admin_logs())?)
    }

    /// Entries that reference `user`, oldest first. Admin only.
    pub fn entries_for(&self, principal: &Principal, user: UserId) -> ServiceResult<Vec<AdminLog>> {
        principal.require_admin()?;
        Ok(self.store.read(|uow| {
            uow.admin_logs()
                .into_iter()
                .filter(|e| e.target_user() == Some(user))
                .collect()
        })?)
    }
}
