//! Subscription Lifecycle Manager.
//!
//! Every operation here is one unit of work. "At most one ACTIVE subscription
//! per user" is checked against the store inside that unit of work (and again
//! by the store on save), never cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_accounts::{AdminAction, AuditActor};
use bazaar_auth::Principal;
use bazaar_billing::{
    AvailablePlan, DEFAULT_LISTING_LIMIT, PlanTier, Subscription, lowest_trial_plan,
    purchasable_plan,
};
use bazaar_core::{Clock, Money, ProductId, SubscriptionId, UserId};
use bazaar_infra::{Store, UnitOfWork};

use crate::audit;
use crate::error::{ServiceError, ServiceResult};
use crate::quota::enforce_in;

/// Result of a purchase, upgrade or cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionChange {
    pub subscription: Subscription,
    /// The ACTIVE subscription this change expired, if any.
    pub replaced: Option<Subscription>,
    /// `true` when an existing subscription was modified instead of a new one created.
    pub in_place: bool,
    /// Listings switched off because the new quota is smaller.
    pub deactivated_listings: Vec<ProductId>,
}

/// One subscription expired by a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiredSubscription {
    pub subscription: Subscription,
    /// Contact address, if the account still exists.
    pub email: Option<String>,
    pub deactivated_listings: Vec<ProductId>,
}

/// A lapsed subscription this run could not expire. It is still ACTIVE, so the
/// next run picks it up again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub subscription: SubscriptionId,
    pub error: ServiceError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Committed expiries.
    pub expired: Vec<ExpiredSubscription>,
    pub failed: Vec<SweepFailure>,
}

impl SweepReport {
    /// Subscriptions this run moved to EXPIRED.
    pub fn processed(&self) -> usize {
        self.expired.len()
    }

    pub fn deactivated_listings(&self) -> usize {
        self.expired.iter().map(|e| e.deactivated_listings.len()).sum()
    }
}

fn trial_plan_for(plans: &[AvailablePlan], tier: PlanTier) -> Option<AvailablePlan> {
    let same_tier: Vec<AvailablePlan> = plans.iter().filter(|p| p.tier() == tier).cloned().collect();
    lowest_trial_plan(&same_tier).cloned()
}

fn plan_for_purchase(uow: &dyn UnitOfWork, tier: PlanTier) -> ServiceResult<AvailablePlan> {
    purchasable_plan(&uow.plans(), tier)
        .cloned()
        .ok_or_else(|| ServiceError::not_found(format!("no active {tier} plan in the catalog")))
}

fn ensure_seller(uow: &dyn UnitOfWork, user: UserId) -> ServiceResult<()> {
    let account = uow
        .user(user)
        .ok_or_else(|| ServiceError::not_found(format!("user {user}")))?;
    account.ensure_active_seller()?;
    Ok(())
}

/// Start a trial on `plan` for `user` inside the caller's unit of work.
pub(crate) fn grant_trial_in(
    uow: &mut dyn UnitOfWork,
    user: UserId,
    plan: &AvailablePlan,
    actor: AuditActor,
    now: DateTime<Utc>,
) -> ServiceResult<Subscription> {
    if uow.active_subscription(user).is_some() {
        return Err(ServiceError::conflict(format!(
            "user {user} already holds an active subscription"
        )));
    }
    let trial = Subscription::start_trial(SubscriptionId::new(), user, plan, now)?;
    uow.save_subscription(trial.clone())?;
    audit::record_in(
        uow,
        actor,
        AdminAction::GrantTrial,
        Some(user),
        format!("plan={} tier={} ends={}", plan.name(), plan.tier(), trial.end_date()),
        now,
    )?;
    Ok(trial)
}

fn purchase_in(
    uow: &mut dyn UnitOfWork,
    user: UserId,
    plan: &AvailablePlan,
    amount: Money,
    now: DateTime<Utc>,
) -> ServiceResult<SubscriptionChange> {
    let replaced = match uow.active_subscription(user) {
        Some(mut previous) => {
            previous.expire(now)?;
            uow.save_subscription(previous.clone())?;
            Some(previous)
        }
        None => None,
    };
    let subscription = Subscription::start(SubscriptionId::new(), user, plan, amount, now)?;
    uow.save_subscription(subscription.clone())?;
    let deactivated_listings = enforce_in(uow, user, subscription.listing_limit(), now)?;
    Ok(SubscriptionChange {
        subscription,
        replaced,
        in_place: false,
        deactivated_listings,
    })
}

pub struct SubscriptionLifecycle<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for SubscriptionLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S: Store> SubscriptionLifecycle<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Admin-initiated trial on the cheapest active trial plan of `tier`.
    #[tracing::instrument(skip(self), fields(admin = %principal.user_id))]
    pub fn grant_trial(&self, principal: &Principal, user: UserId, tier: PlanTier) -> ServiceResult<Subscription> {
        principal.require_admin()?;
        let now = self.clock.now();
        let trial = self.store.transaction(|uow| {
            ensure_seller(uow, user)?;
            let plan = trial_plan_for(&uow.plans(), tier)
                .ok_or_else(|| ServiceError::not_found(format!("no active {tier} trial plan")))?;
            grant_trial_in(uow, user, &plan, AuditActor::Admin(principal.user_id), now)
        })?;
        tracing::info!(subscription = %trial.id_typed(), "trial granted");
        Ok(trial)
    }

    /// Expire the current ACTIVE subscription (if any) and start a new one on `tier`.
    ///
    /// Both steps commit together. The recorded `amount` is what the caller says
    /// was paid; settlement happens elsewhere.
    #[tracing::instrument(skip(self), fields(user = %principal.user_id))]
    pub fn purchase(&self, principal: &Principal, tier: PlanTier, amount: Money) -> ServiceResult<SubscriptionChange> {
        principal.require_seller()?;
        let user = principal.user_id;
        let now = self.clock.now();
        let change = self.store.transaction(|uow| {
            ensure_seller(uow, user)?;
            let plan = plan_for_purchase(uow, tier)?;
            purchase_in(uow, user, &plan, amount, now)
        })?;
        tracing::info!(
            subscription = %change.subscription.id_typed(),
            tier = %tier,
            replaced = change.replaced.is_some(),
            "subscription purchased"
        );
        Ok(change)
    }

    /// Move the ACTIVE subscription onto `tier` in place, or purchase at list price
    /// when there is none.
    ///
    /// Downgrades are allowed and re-enforce the smaller quota immediately. The
    /// same tier renews: the new term is added to what is left.
    #[tracing::instrument(skip(self), fields(user = %principal.user_id))]
    pub fn upgrade(&self, principal: &Principal, tier: PlanTier) -> ServiceResult<SubscriptionChange> {
        principal.require_seller()?;
        let user = principal.user_id;
        let now = self.clock.now();
        let change = self.store.transaction(|uow| {
            ensure_seller(uow, user)?;
            let plan = plan_for_purchase(uow, tier)?;
            match uow.active_subscription(user) {
                Some(mut current) => {
                    current.change_plan(&plan, now)?;
                    uow.save_subscription(current.clone())?;
                    let deactivated_listings = enforce_in(uow, user, current.listing_limit(), now)?;
                    Ok(SubscriptionChange {
                        subscription: current,
                        replaced: None,
                        in_place: true,
                        deactivated_listings,
                    })
                }
                None => purchase_in(uow, user, &plan, plan.price(), now),
            }
        })?;
        tracing::info!(
            subscription = %change.subscription.id_typed(),
            tier = %tier,
            in_place = change.in_place,
            "subscription changed"
        );
        Ok(change)
    }

    /// ACTIVE -> CANCELLED; the seller falls back to the default quota right away.
    #[tracing::instrument(skip(self), fields(user = %principal.user_id))]
    pub fn cancel(&self, principal: &Principal) -> ServiceResult<SubscriptionChange> {
        let user = principal.user_id;
        let now = self.clock.now();
        self.store.transaction(|uow| {
            let mut current = uow
                .active_subscription(user)
                .ok_or_else(|| ServiceError::not_found("active subscription"))?;
            current.cancel(now)?;
            uow.save_subscription(current.clone())?;
            let deactivated_listings = enforce_in(uow, user, DEFAULT_LISTING_LIMIT, now)?;
            Ok(SubscriptionChange {
                subscription: current,
                replaced: None,
                in_place: true,
                deactivated_listings,
            })
        })
    }

    pub fn current(&self, principal: &Principal, user: UserId) -> ServiceResult<Option<Subscription>> {
        principal.require_self_or_admin(user)?;
        Ok(self.store.read(|uow| uow.active_subscription(user))?)
    }

    /// Every subscription the user ever held, oldest first.
    pub fn history(&self, principal: &Principal, user: UserId) -> ServiceResult<Vec<Subscription>> {
        principal.require_self_or_admin(user)?;
        Ok(self.store.read(|uow| uow.subscriptions_for(user))?)
    }

    /// Expire every subscription that is still ACTIVE with `end_date < now`.
    ///
    /// Each subscription is handled in its own unit of work that re-checks the
    /// row before changing it, so overlapping sweeps converge: whichever commits
    /// second finds nothing to do. Sellers drop to the default quota.
    ///
    /// A row that fails is recorded in [`SweepReport::failed`] and the run moves
    /// on; the report always lists every expiry that committed.
    #[tracing::instrument(skip(self))]
    pub fn sweep_expired(&self, actor: AuditActor, now: DateTime<Utc>) -> ServiceResult<SweepReport> {
        let candidates: Vec<SubscriptionId> = self
            .store
            .read(|uow| uow.lapsed_subscriptions(now))?
            .into_iter()
            .map(|s| s.id_typed())
            .collect();

        let mut report = SweepReport::default();
        for id in candidates {
            let result = self.store.transaction(|uow| {
                let Some(mut subscription) = uow.subscription(id) else {
                    return Ok(None);
                };
                if !subscription.is_lapsed(now) {
                    return Ok(None);
                }
                let user = subscription.user_id();
                subscription.expire(now)?;
                uow.save_subscription(subscription.clone())?;
                let deactivated_listings = enforce_in(uow, user, DEFAULT_LISTING_LIMIT, now)?;
                audit::record_in(
                    uow,
                    actor,
                    AdminAction::ExpireSubscription,
                    Some(user),
                    format!(
                        "subscription={id} tier={} ended={} deactivated={}",
                        subscription.plan_type(),
                        subscription.end_date(),
                        deactivated_listings.len()
                    ),
                    now,
                )?;
                Ok::<_, ServiceError>(Some(ExpiredSubscription {
                    email: uow.user(user).map(|u| u.email),
                    subscription,
                    deactivated_listings,
                }))
            });
            match result {
                Ok(Some(expired)) => report.expired.push(expired),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(subscription = %id, %error, "could not expire subscription");
                    report.failed.push(SweepFailure {
                        subscription: id,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            processed = report.processed(),
            failed = report.failed.len(),
            deactivated = report.deactivated_listings(),
            "expiry sweep finished"
        );
        Ok(report)
    }
}
