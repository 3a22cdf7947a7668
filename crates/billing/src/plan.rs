//! Plan catalog vocabulary.
//!
//! A plan tier fixes how many product listings a seller may keep active. Catalog
//! entries (`AvailablePlan`) carry price, duration and trial eligibility and are
//! referenced, never owned, by subscriptions.

use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{DomainError, DomainResult, Entity, Money, PlanId};

/// Plan tier label.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTier {
    Basic,
    Standard,
    Premium,
}

impl PlanTier {
    pub const fn listing_limit(self) -> ListingLimit {
        match self {
            PlanTier::Basic => ListingLimit::Limited(2),
            PlanTier::Standard => ListingLimit::Limited(20),
            PlanTier::Premium => ListingLimit::Unlimited,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Basic => "BASIC",
            PlanTier::Standard => "STANDARD",
            PlanTier::Premium => "PREMIUM",
        }
    }
}

impl core::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BASIC" => Ok(PlanTier::Basic),
            "STANDARD" => Ok(PlanTier::Standard),
            "PREMIUM" => Ok(PlanTier::Premium),
            other => Err(DomainError::invariant(format!("unrecognized plan tier '{other}'"))),
        }
    }
}

/// Maximum number of simultaneously active listings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingLimit {
    Limited(u32),
    Unlimited,
}

impl ListingLimit {
    /// Whether a seller with `active` listings may activate one more.
    pub fn allows_another(self, active: usize) -> bool {
        match self {
            ListingLimit::Limited(max) => active < max as usize,
            ListingLimit::Unlimited => true,
        }
    }

    /// Number of listings above the limit.
    pub fn excess(self, active: usize) -> usize {
        match self {
            ListingLimit::Limited(max) => active.saturating_sub(max as usize),
            ListingLimit::Unlimited => 0,
        }
    }
}

/// Quota applied to a seller with no ACTIVE subscription.
pub const DEFAULT_LISTING_LIMIT: ListingLimit = PlanTier::Basic.listing_limit();

/// Listing limit for a tier label; unknown labels are an error, never a default.
pub fn listing_limit_for(tier: &str) -> DomainResult<ListingLimit> {
    Ok(PlanTier::from_str(tier)?.listing_limit())
}

/// A named feature flag advertised by a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFeature {
    pub key: String,
    pub included: bool,
}

impl PlanFeature {
    pub fn included(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            included: true,
        }
    }

    pub fn excluded(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            included: false,
        }
    }
}

/// Input for a new catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlan {
    pub name: String,
    pub tier: PlanTier,
    pub price: Money,
    pub duration_days: u32,
    pub features: Vec<PlanFeature>,
    pub is_trial: bool,
    pub trial_days: Option<u32>,
}

/// Catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailablePlan {
    id: PlanId,
    name: String,
    tier: PlanTier,
    price: Money,
    duration_days: u32,
    features: Vec<PlanFeature>,
    is_active: bool,
    is_trial: bool,
    trial_days: Option<u32>,
    created_at: DateTime<Utc>,
}

impl AvailablePlan {
    pub fn create(id: PlanId, new: NewPlan, now: DateTime<Utc>) -> DomainResult<Self> {
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("plan name cannot be empty"));
        }
        if new.duration_days == 0 {
            return Err(DomainError::validation("plan duration must be at least one day"));
        }
        if new.is_trial {
            if new.trial_days == Some(0) {
                return Err(DomainError::validation("trial length must be at least one day"));
            }
            if !new.price.is_zero() {
                return Err(DomainError::validation("trial plans must be free"));
            }
        } else if new.trial_days.is_some() {
            return Err(DomainError::validation("trial length given for a non-trial plan"));
        }

        Ok(Self {
            id,
            name: new.name.trim().to_string(),
            tier: new.tier,
            price: new.price,
            duration_days: new.duration_days,
            features: new.features,
            is_active: true,
            is_trial: new.is_trial,
            trial_days: new.trial_days,
            created_at: now,
        })
    }

    pub fn id_typed(&self) -> PlanId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tier(&self) -> PlanTier {
        self.tier
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn duration_days(&self) -> u32 {
        self.duration_days
    }

    pub fn features(&self) -> &[PlanFeature] {
        &self.features
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_trial(&self) -> bool {
        self.is_trial
    }

    pub fn trial_days(&self) -> Option<u32> {
        self.trial_days
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Length of a subscription started on this plan.
    ///
    /// Trials run for `trial_days` when set, otherwise for the plan duration.
    pub fn term(&self) -> Duration {
        let days = match (self.is_trial, self.trial_days) {
            (true, Some(days)) => days,
            _ => self.duration_days,
        };
        Duration::days(i64::from(days))
    }

    /// Stop offering this plan. Existing subscriptions keep their snapshot.
    pub fn retire(&mut self) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::conflict("plan is already retired"));
        }
        self.is_active = false;
        Ok(())
    }
}

impl Entity for AvailablePlan {
    type Id = PlanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Catalog order: ascending price, then tier, then name.
pub fn order_catalog(mut plans: Vec<AvailablePlan>) -> Vec<AvailablePlan> {
    plans.sort_by(|a, b| {
        a.price
            .cmp(&b.price)
            .then(a.tier.cmp(&b.tier))
            .then_with(|| a.name.cmp(&b.name))
            .then(a.id.cmp(&b.id))
    });
    plans
}

/// Cheapest active trial-enabled plan (ties broken by tier, then name).
pub fn lowest_trial_plan(plans: &[AvailablePlan]) -> Option<&AvailablePlan> {
    plans
        .iter()
        .filter(|p| p.is_active && p.is_trial)
        .min_by(|a, b| {
            a.price
                .cmp(&b.price)
                .then(a.tier.cmp(&b.tier))
                .then_with(|| a.name.cmp(&b.name))
        })
}

/// Active plan to charge for `tier`, preferring paid (non-trial) entries.
pub fn purchasable_plan(plans: &[AvailablePlan], tier: PlanTier) -> Option<&AvailablePlan> {
    let mut candidates: Vec<&AvailablePlan> = plans
        .iter()
        .filter(|p| p.is_active && p.tier == tier)
        .collect();
    candidates.sort_by(|a, b| {
        a.is_trial
            .cmp(&b.is_trial)
            .then(a.price.cmp(&b.price))
            .then_with(|| a.name.cmp(&b.name))
    });
    candidates.into_iter().next()
}
