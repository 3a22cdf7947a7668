//! Billing domain module.
//!
//! Commission rules, the plan catalog vocabulary and the subscription entity,
//! implemented as deterministic domain logic (no IO, no storage).

pub mod commission;
pub mod plan;
pub mod subscription;

pub use commission::{
    CommissionSplit, GrossedUp, commission_for, derive_total_from_net, split_gross,
};
pub use plan::{
    AvailablePlan, DEFAULT_LISTING_LIMIT, ListingLimit, NewPlan, PlanFeature, PlanTier,
    listing_limit_for, lowest_trial_plan, order_catalog, purchasable_plan,
};
pub use subscription::{Subscription, SubscriptionStatus};
