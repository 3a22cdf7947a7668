use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{DomainError, DomainResult, Entity, Money, PlanId, SubscriptionId, UserId};

use crate::plan::{AvailablePlan, ListingLimit, PlanTier};

/// Subscription status lifecycle.
///
/// `Active` is the only non-terminal state; rows are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

/// A user's subscription to a plan tier.
///
/// # Invariants
/// - `plan_type` is a snapshot of the plan tier at purchase time and stays valid
///   even if the catalog entry is later retired or edited.
/// - Only `Active` subscriptions change; `Expired`/`Cancelled` are history.
/// - `end_date > start_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    id: SubscriptionId,
    user_id: UserId,
    plan_id: Option<PlanId>,
    plan_type: PlanTier,
    status: SubscriptionStatus,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    amount: Money,
    is_trial: bool,
    updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Start a paid subscription on `plan`, running for the plan's term from `now`.
    pub fn start(
        id: SubscriptionId,
        user_id: UserId,
        plan: &AvailablePlan,
        amount: Money,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !plan.is_active() {
            return Err(DomainError::conflict(format!(
                "plan '{}' is no longer offered",
                plan.name()
            )));
        }
        Ok(Self {
            id,
            user_id,
            plan_id: Some(plan.id_typed()),
            plan_type: plan.tier(),
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: now + plan.term(),
            amount,
            is_trial: plan.is_trial(),
            updated_at: now,
        })
    }

    /// Start a zero-cost trial on a trial-enabled plan.
    pub fn start_trial(
        id: SubscriptionId,
        user_id: UserId,
        plan: &AvailablePlan,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !plan.is_trial() {
            return Err(DomainError::validation(format!(
                "plan '{}' is not trial-enabled",
                plan.name()
            )));
        }
        Self::start(id, user_id, plan, Money::ZERO, now)
    }

    pub fn id_typed(&self) -> SubscriptionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn plan_id(&self) -> Option<PlanId> {
        self.plan_id
    }

    pub fn plan_type(&self) -> PlanTier {
        self.plan_type
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn end_date(&self) -> DateTime<Utc> {
        self.end_date
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn is_trial(&self) -> bool {
        self.is_trial
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Still marked active but past its end date.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.end_date < now
    }

    pub fn listing_limit(&self) -> ListingLimit {
        self.plan_type.listing_limit()
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::conflict(format!(
                "subscription {} is {:?}, not active",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// ACTIVE -> EXPIRED.
    pub fn expire(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.status = SubscriptionStatus::Expired;
        self.updated_at = now;
        Ok(())
    }

    /// ACTIVE -> CANCELLED.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.status = SubscriptionStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Move an active subscription onto another plan in place.
    ///
    /// The remaining term is kept and the new plan's term is added to it; a
    /// subscription already past its end date restarts from `now`.
    pub fn change_plan(&mut self, plan: &AvailablePlan, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if !plan.is_active() {
            return Err(DomainError::conflict(format!(
                "plan '{}' is no longer offered",
                plan.name()
            )));
        }
        let base = self.end_date.max(now);
        self.plan_id = Some(plan.id_typed());
        self.plan_type = plan.tier();
        self.amount = plan.price();
        self.is_trial = plan.is_trial();
        self.end_date = base + plan.term();
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Subscription {
    type Id = SubscriptionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{NewPlan, PlanFeature};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn plan(tier: PlanTier, price: u64, trial_days: Option<u32>) -> AvailablePlan {
        AvailablePlan::create(
            PlanId::new(),
            NewPlan {
                name: format!("{tier} plan"),
                tier,
                price: Money::from_major(price),
                duration_days: 30,
                features: vec![PlanFeature::included("listings")],
                is_trial: trial_days.is_some(),
                trial_days,
            },
            t0(),
        )
        .unwrap()
    }

    #[test]
    fn start_runs_for_plan_term() {
        let s = Subscription::start(
            SubscriptionId::new(),
            UserId::new(),
            &plan(PlanTier::Standard, 2_000, None),
            Money::from_major(2_000),
            t0(),
        )
        .unwrap();
        assert!(s.is_active());
        assert_eq!(s.plan_type(), PlanTier::Standard);
        assert_eq!(s.end_date(), t0() + Duration::days(30));
        assert!(!s.is_trial());
    }

    #[test]
    fn trial_is_free_and_uses_trial_length() {
        let s = Subscription::start_trial(
            SubscriptionId::new(),
            UserId::new(),
            &plan(PlanTier::Basic, 0, Some(14)),
            t0(),
        )
        .unwrap();
        assert!(s.is_trial());
        assert_eq!(s.amount(), Money::ZERO);
        assert_eq!(s.end_date(), t0() + Duration::days(14));
    }

    #[test]
    fn trial_requires_trial_plan() {
        let err = Subscription::start_trial(
            SubscriptionId::new(),
            UserId::new(),
            &plan(PlanTier::Basic, 500, None),
            t0(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn lapsed_only_when_active_and_past_end() {
        let mut s = Subscription::start(
            SubscriptionId::new(),
            UserId::new(),
            &plan(PlanTier::Basic, 500, None),
            Money::from_major(500),
            t0(),
        )
        .unwrap();
        let after = t0() + Duration::days(31);
        assert!(!s.is_lapsed(t0() + Duration::days(30)));
        assert!(s.is_lapsed(after));
        s.expire(after).unwrap();
        assert!(!s.is_lapsed(after));
        assert_eq!(s.status(), SubscriptionStatus::Expired);
    }

    #[test]
    fn terminal_states_do_not_transition() {
        let mut s = Subscription::start(
            SubscriptionId::new(),
            UserId::new(),
            &plan(PlanTier::Basic, 500, None),
            Money::from_major(500),
            t0(),
        )
        .unwrap();
        s.cancel(t0()).unwrap();
        assert!(matches!(s.expire(t0()), Err(DomainError::Conflict(_))));
        assert!(matches!(s.cancel(t0()), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn change_plan_extends_remaining_term() {
        let mut s = Subscription::start(
            SubscriptionId::new(),
            UserId::new(),
            &plan(PlanTier::Basic, 500, None),
            Money::from_major(500),
            t0(),
        )
        .unwrap();
        let premium = plan(PlanTier::Premium, 5_000, None);
        let later = t0() + Duration::days(10);
        s.change_plan(&premium, later).unwrap();
        assert_eq!(s.plan_type(), PlanTier::Premium);
        assert_eq!(s.amount(), Money::from_major(5_000));
        assert_eq!(s.end_date(), t0() + Duration::days(60));
        assert_eq!(s.listing_limit(), ListingLimit::Unlimited);
    }
}
