//! `Marketplace`: the operations exposed to request handlers and the scheduler.
//!
//! Each operation authorizes the caller, delegates to one lifecycle component,
//! and (for operations that notify) dispatches after the change has committed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use bazaar_accounts::{AdminLog, AuditActor, NewUser, User};
use bazaar_auth::password::{validate_email, validate_password};
use bazaar_auth::{AuthError, Credentials, Identity, Principal, Role};
use bazaar_billing::{AvailablePlan, NewPlan, PlanTier, Subscription};
use bazaar_core::{Clock, Money, PlanId, ProductId, RfqId, TransactionId, UserId, MessageId};
use bazaar_deals::{ChatMessage, DealTerms, NewRfq, Rfq, Transaction};
use bazaar_infra::{
    MarketplaceConfig, Notification, NotificationDispatcher, Notifier, Store, Template,
};
use bazaar_products::{NewListing, Product};

use crate::approval::{ApprovalOutcome, ApprovalWorkflow, RejectionOutcome};
use crate::audit::AdminAudit;
use crate::blocking;
use crate::catalog::PlanCatalog;
use crate::deals::{DealPipeline, TransactionReceipt};
use crate::error::{ServiceError, ServiceResult};
use crate::quota::ListingQuotaEnforcer;
use crate::subscriptions::{SubscriptionChange, SubscriptionLifecycle, SweepReport};

/// Self-service registration input.
#[derive(Clone)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: Role,
    pub seller_plan: Option<PlanTier>,
}

impl core::fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SignupRequest")
            .field("email", &self.email)
            .field("role", &self.role)
            .field("seller_plan", &self.seller_plan)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignupOutcome {
    pub user: User,
    pub pending_approval: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginOutcome {
    pub principal: Principal,
    pub user: User,
    /// Snapshot of the ACTIVE subscription at login time.
    pub subscription: Option<Subscription>,
}

pub struct Marketplace<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    identity: Arc<dyn Identity>,
    notifications: NotificationDispatcher,
    catalog: PlanCatalog<S>,
    subscriptions: SubscriptionLifecycle<S>,
    quota: ListingQuotaEnforcer<S>,
    approvals: ApprovalWorkflow<S>,
    deals: DealPipeline<S>,
    audit: AdminAudit<S>,
}

impl<S: Store + 'static> Marketplace<S> {
    pub fn new(
        store: Arc<S>,
        identity: Arc<dyn Identity>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: &MarketplaceConfig,
    ) -> Self {
        let notifications = NotificationDispatcher::new(notifier, config.notify_timeout);
        Self {
            catalog: PlanCatalog::new(store.clone(), clock.clone()),
            subscriptions: SubscriptionLifecycle::new(store.clone(), clock.clone()),
            quota: ListingQuotaEnforcer::new(store.clone(), clock.clone()),
            approvals: ApprovalWorkflow::new(
                store.clone(),
                clock.clone(),
                identity.clone(),
                notifications.clone(),
            ),
            deals: DealPipeline::new(store.clone(), clock.clone()),
            audit: AdminAudit::new(store.clone()),
            store,
            clock,
            identity,
            notifications,
        }
    }

    pub fn catalog(&self) -> &PlanCatalog<S> {
        &self.catalog
    }

    pub fn subscriptions(&self) -> &SubscriptionLifecycle<S> {
        &self.subscriptions
    }

    pub fn quota(&self) -> &ListingQuotaEnforcer<S> {
        &self.quota
    }

    pub fn approvals(&self) -> &ApprovalWorkflow<S> {
        &self.approvals
    }

    pub fn deals(&self) -> &DealPipeline<S> {
        &self.deals
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an administrator account (operator tooling, not part of signup).
    pub fn bootstrap_admin(&self, name: &str, email: &str, password: &str) -> ServiceResult<User> {
        validate_password(password).map_err(ServiceError::Validation)?;
        validate_email(email).map_err(ServiceError::Validation)?;
        let admin = User::administrator(UserId::new(), name, email, self.clock.now())?;
        insert_account(&*self.store, &*self.identity, admin, password)
    }

    #[tracing::instrument(skip(self))]
    pub async fn signup(&self, request: SignupRequest) -> ServiceResult<SignupOutcome> {
        validate_password(&request.password).map_err(ServiceError::Validation)?;
        validate_email(&request.email).map_err(ServiceError::Validation)?;
        let user = User::register(
            UserId::new(),
            NewUser {
                name: request.name,
                email: request.email,
                phone: request.phone,
                role: request.role,
                seller_plan: request.seller_plan,
            },
            self.clock.now(),
        )?;
        let store = self.store.clone();
        let identity = self.identity.clone();
        let password = request.password;
        let user = blocking::run(move || insert_account(&*store, &*identity, user, &password)).await?;
        let pending_approval = !user.is_approved;
        tracing::info!(user = %user.id, role = %user.role, pending_approval, "account created");

        if pending_approval {
            self.notifications
                .dispatch(Notification::new(
                    user.email.clone(),
                    Template::AccountPending,
                    json!({ "name": user.name, "role": user.role }),
                ))
                .await;
        }
        Ok(SignupOutcome {
            user,
            pending_approval,
        })
    }

    #[tracing::instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub fn login(&self, credentials: &Credentials) -> ServiceResult<LoginOutcome> {
        let user_id = self.identity.verify(credentials)?;
        let (user, subscription) = self
            .store
            .read(|uow| (uow.user(user_id), uow.active_subscription(user_id)))?;
        let user = user.ok_or(AuthError::InvalidCredentials)?;
        if !user.is_approved {
            return Err(AuthError::PendingApproval.into());
        }
        Ok(LoginOutcome {
            principal: user.principal(),
            user,
            subscription,
        })
    }

    pub fn pending_accounts(&self, principal: &Principal) -> ServiceResult<Vec<User>> {
        self.approvals.pending(principal)
    }

    pub async fn approve_user(&self, principal: &Principal, user: UserId) -> ServiceResult<ApprovalOutcome> {
        self.approvals.approve(principal, user).await
    }

    pub async fn reject_user(&self, principal: &Principal, user: UserId) -> ServiceResult<RejectionOutcome> {
        self.approvals.reject(principal, user).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Plans & Subscriptions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn list_plans(&self, active_only: bool) -> ServiceResult<Vec<AvailablePlan>> {
        self.catalog.list_plans(active_only)
    }

    pub fn publish_plan(&self, principal: &Principal, plan: NewPlan) -> ServiceResult<AvailablePlan> {
        self.catalog.publish(principal, plan)
    }

    pub fn retire_plan(&self, principal: &Principal, plan: PlanId) -> ServiceResult<AvailablePlan> {
        self.catalog.retire(principal, plan)
    }

    pub fn purchase_subscription(
        &self,
        principal: &Principal,
        tier: PlanTier,
        amount: Money,
    ) -> ServiceResult<SubscriptionChange> {
        self.subscriptions.purchase(principal, tier, amount)
    }

    pub fn upgrade_subscription(&self, principal: &Principal, tier: PlanTier) -> ServiceResult<SubscriptionChange> {
        self.subscriptions.upgrade(principal, tier)
    }

    pub fn cancel_subscription(&self, principal: &Principal) -> ServiceResult<SubscriptionChange> {
        self.subscriptions.cancel(principal)
    }

    pub fn current_subscription(&self, principal: &Principal) -> ServiceResult<Option<Subscription>> {
        self.subscriptions.current(principal, principal.user_id)
    }

    pub fn subscription_history(&self, principal: &Principal) -> ServiceResult<Vec<Subscription>> {
        self.subscriptions.history(principal, principal.user_id)
    }

    /// Expire lapsed subscriptions as of `now`.
    ///
    /// `by` is `None` for the scheduler and an admin principal for a manual run.
    #[tracing::instrument(skip(self, by))]
    pub async fn sweep_expired_subscriptions(
        &self,
        by: Option<&Principal>,
        now: DateTime<Utc>,
    ) -> ServiceResult<SweepReport> {
        let actor = match by {
            Some(principal) => {
                principal.require_admin()?;
                AuditActor::Admin(principal.user_id)
            }
            None => AuditActor::System,
        };
        let lifecycle = self.subscriptions.clone();
        let report = blocking::run(move || lifecycle.sweep_expired(actor, now)).await?;

        for expired in &report.expired {
            let Some(email) = expired.email.clone() else {
                continue;
            };
            self.notifications
                .dispatch(Notification::new(
                    email,
                    Template::SubscriptionExpired,
                    json!({
                        "tier": expired.subscription.plan_type(),
                        "ended": expired.subscription.end_date(),
                        "deactivated_listings": expired.deactivated_listings.len(),
                    }),
                ))
                .await;
        }
        Ok(report)
    }

    /// Scheduler entry point: sweep as of the engine clock.
    pub async fn run_scheduled_sweep(&self) -> ServiceResult<SweepReport> {
        let now = self.clock.now();
        self.sweep_expired_subscriptions(None, now).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listings
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_product(&self, principal: &Principal, listing: NewListing) -> ServiceResult<Product> {
        self.quota.create_product(principal, listing)
    }

    pub fn set_listing_active(
        &self,
        principal: &Principal,
        product: ProductId,
        active: bool,
    ) -> ServiceResult<Product> {
        self.quota.set_listing_active(principal, product, active)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Deals
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_rfq(&self, principal: &Principal, rfq: NewRfq) -> ServiceResult<Rfq> {
        self.deals.create_rfq(principal, rfq)
    }

    pub fn post_message(&self, principal: &Principal, rfq: RfqId, body: &str) -> ServiceResult<ChatMessage> {
        self.deals.post_message(principal, rfq, body)
    }

    pub fn messages(&self, principal: &Principal, rfq: RfqId) -> ServiceResult<Vec<ChatMessage>> {
        self.deals.messages(principal, rfq)
    }

    pub fn mark_read(&self, principal: &Principal, message: MessageId) -> ServiceResult<ChatMessage> {
        self.deals.mark_read(principal, message)
    }

    pub async fn create_transaction(
        &self,
        principal: &Principal,
        terms: DealTerms,
    ) -> ServiceResult<TransactionReceipt> {
        let deals = self.deals.clone();
        let store = self.store.clone();
        let principal = *principal;
        let (receipt, parties) = blocking::run(move || {
            let receipt = deals.create_transaction(&principal, terms)?;
            let tx = &receipt.transaction;
            let parties = store.read(|uow| [uow.user(tx.buyer_id()), uow.user(tx.seller_id())])?;
            Ok((receipt, parties))
        })
        .await?;

        let tx = &receipt.transaction;
        let data = json!({
            "invoice": receipt.invoice.number().as_str(),
            "product_amount": tx.product_amount().to_string(),
            "commission": tx.commission_amount().to_string(),
            "total": tx.total_amount().to_string(),
        });
        for party in parties.into_iter().flatten() {
            self.notifications
                .dispatch(Notification::new(party.email, Template::TransactionCreated, data.clone()))
                .await;
        }
        Ok(receipt)
    }

    pub fn transaction(&self, principal: &Principal, id: TransactionId) -> ServiceResult<TransactionReceipt> {
        self.deals.transaction(principal, id)
    }

    pub fn complete_transaction(&self, principal: &Principal, id: TransactionId) -> ServiceResult<Transaction> {
        self.deals.complete_transaction(principal, id)
    }

    pub fn fail_transaction(&self, principal: &Principal, id: TransactionId) -> ServiceResult<Transaction> {
        self.deals.fail_transaction(principal, id)
    }

    pub fn close_rfq(&self, principal: &Principal, rfq: RfqId) -> ServiceResult<Rfq> {
        self.deals.close_rfq(principal, rfq)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Audit
    // ─────────────────────────────────────────────────────────────────────────

    pub fn admin_logs(&self, principal: &Principal) -> ServiceResult<Vec<AdminLog>> {
        self.audit.entries(principal)
    }

    pub fn admin_logs_for(&self, principal: &Principal, user: UserId) -> ServiceResult<Vec<AdminLog>> {
        self.audit.entries_for(principal, user)
    }
}

/// Store the account, then enroll its credentials. A failed enrollment takes
/// the account back out, since it could never log in.
fn insert_account<S: Store>(
    store: &S,
    identity: &dyn Identity,
    user: User,
    password: &str,
) -> ServiceResult<User> {
    store.transaction(|uow| {
        if uow.user_by_email(&user.email).is_some() {
            return Err(ServiceError::conflict("email is already registered"));
        }
        uow.save_user(user.clone())?;
        Ok(())
    })?;

    if let Err(err) = identity.enroll(user.id, &Credentials::new(user.email.clone(), password)) {
        let user_id = user.id;
        store.transaction(|uow| {
            uow.purge_user(user_id);
            Ok::<_, ServiceError>(())
        })?;
        return Err(err.into());
    }
    Ok(user)
}
