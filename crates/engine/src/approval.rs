//! Approval Workflow for seller-capable accounts.
//!
//! PENDING -> APPROVED grants a trial (when the account never had a
//! subscription) and notifies the user. PENDING -> REJECTED purges the account.
//! Notifications go out after the unit of work commits; a failed send is
//! logged and the approval or rejection stands.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use bazaar_accounts::{AccountSnapshot, AdminAction, AuditActor, User};
use bazaar_auth::{Identity, Principal};
use bazaar_billing::{Subscription, lowest_trial_plan};
use bazaar_core::{Clock, UserId};
use bazaar_infra::{Notification, NotificationDispatcher, PurgeReport, Store, Template};

use crate::audit;
use crate::blocking;
use crate::error::{ServiceError, ServiceResult};
use crate::subscriptions::grant_trial_in;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalOutcome {
    pub user: User,
    /// Trial granted as part of the approval, if any.
    pub trial: Option<Subscription>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionOutcome {
    /// What the account looked like before it was deleted.
    pub snapshot: AccountSnapshot,
    pub purged: PurgeReport,
}

pub struct ApprovalWorkflow<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    identity: Arc<dyn Identity>,
    notifications: NotificationDispatcher,
}

impl<S> Clone for ApprovalWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            identity: self.identity.clone(),
            notifications: self.notifications.clone(),
        }
    }
}

impl<S: Store + 'static> ApprovalWorkflow<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        identity: Arc<dyn Identity>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            clock,
            identity,
            notifications,
        }
    }

    /// Accounts still waiting for a decision, oldest first. Admin only.
    pub fn pending(&self, principal: &Principal) -> ServiceResult<Vec<User>> {
        principal.require_admin()?;
        let mut pending = self.store.read(|uow| uow.pending_users())?;
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    #[tracing::instrument(skip(self), fields(admin = %principal.user_id))]
    pub async fn approve(&self, principal: &Principal, user_id: UserId) -> ServiceResult<ApprovalOutcome> {
        principal.require_admin()?;
        let workflow = self.clone();
        let principal = *principal;
        let outcome = blocking::run(move || workflow.commit_approval(&principal, user_id)).await?;

        tracing::info!(
            user = %outcome.user.id,
            trial = outcome.trial.is_some(),
            "account approved"
        );

        self.notifications
            .dispatch(Notification::new(
                outcome.user.email.clone(),
                Template::AccountApproved,
                json!({
                    "name": outcome.user.name,
                    "role": outcome.user.role,
                    "trial_plan": outcome.trial.as_ref().map(|t| t.plan_type()),
                    "trial_ends": outcome.trial.as_ref().map(|t| t.end_date()),
                }),
            ))
            .await;

        Ok(outcome)
    }

    fn commit_approval(&self, principal: &Principal, user_id: UserId) -> ServiceResult<ApprovalOutcome> {
        let now = self.clock.now();
        let actor = AuditActor::Admin(principal.user_id);

        self.store.transaction(|uow| {
            let mut user = uow
                .user(user_id)
                .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")))?;
            user.approve(now)?;
            uow.save_user(user.clone())?;
            audit::record_in(
                uow,
                actor,
                AdminAction::ApproveUser,
                Some(user.id),
                format!("email={} role={}", user.email, user.role),
                now,
            )?;

            let trial = if uow.subscriptions_for(user.id).is_empty() {
                match lowest_trial_plan(&uow.plans()).cloned() {
                    Some(plan) => Some(grant_trial_in(uow, user.id, &plan, actor, now)?),
                    None => {
                        tracing::warn!(user = %user.id, "no active trial plan; approved without a trial");
                        None
                    }
                }
            } else {
                None
            };
            Ok::<_, ServiceError>(ApprovalOutcome { user, trial })
        })
    }

    #[tracing::instrument(skip(self), fields(admin = %principal.user_id))]
    pub async fn reject(&self, principal: &Principal, user_id: UserId) -> ServiceResult<RejectionOutcome> {
        principal.require_admin()?;
        let workflow = self.clone();
        let principal = *principal;
        let outcome = blocking::run(move || workflow.commit_rejection(&principal, user_id)).await?;
        tracing::info!(user = %user_id, "account rejected and purged");

        self.notifications
            .dispatch(Notification::new(
                outcome.snapshot.email.clone(),
                Template::AccountRejected,
                json!({ "role": outcome.snapshot.role }),
            ))
            .await;

        Ok(outcome)
    }

    fn commit_rejection(&self, principal: &Principal, user_id: UserId) -> ServiceResult<RejectionOutcome> {
        let now = self.clock.now();

        let outcome = self.store.transaction(|uow| {
            let user = uow
                .user(user_id)
                .ok_or_else(|| ServiceError::not_found(format!("user {user_id}")))?;
            let snapshot = user.reject()?;
            let purged = uow.purge_user(user_id);
            audit::record_in(
                uow,
                AuditActor::Admin(principal.user_id),
                AdminAction::RejectUser,
                Some(user_id),
                format!(
                    "email={} role={} products={} rfqs={} messages={}",
                    snapshot.email, snapshot.role, purged.products, purged.rfqs, purged.messages
                ),
                now,
            )?;
            Ok::<_, ServiceError>(RejectionOutcome { snapshot, purged })
        })?;

        self.identity.forget(user_id);
        Ok(outcome)
    }
}
