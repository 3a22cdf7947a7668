//! Plan Catalog service.
//!
//! Reads are open to everyone. Publishing and retiring plans is the separate
//! administrative path; lifecycle components never mutate plans.

use std::sync::Arc;

use bazaar_accounts::{AdminAction, AuditActor};
use bazaar_auth::Principal;
use bazaar_billing::{AvailablePlan, ListingLimit, NewPlan, listing_limit_for, order_catalog};
use bazaar_core::{Clock, PlanId};
use bazaar_infra::Store;

use crate::audit;
use crate::error::{ServiceError, ServiceResult};

pub struct PlanCatalog<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> PlanCatalog<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Plans in ascending price order; `active_only` hides retired entries.
    pub fn list_plans(&self, active_only: bool) -> ServiceResult<Vec<AvailablePlan>> {
        let plans = self.store.read(|uow| uow.plans())?;
        let plans = plans
            .into_iter()
            .filter(|p| !active_only || p.is_active())
            .collect();
        Ok(order_catalog(plans))
    }

    /// Listing limit for a tier label. Unknown labels are a domain error.
    pub fn listing_limit(&self, tier: &str) -> ServiceResult<ListingLimit> {
        Ok(listing_limit_for(tier)?)
    }

    #[tracing::instrument(skip(self, plan), fields(admin = %principal.user_id, plan = %plan.name))]
    pub fn publish(&self, principal: &Principal, plan: NewPlan) -> ServiceResult<AvailablePlan> {
        principal.require_admin()?;
        let now = self.clock.now();
        let created = AvailablePlan::create(PlanId::new(), plan, now)?;
        self.store.transaction(|uow| {
            uow.save_plan(created.clone())?;
            audit::record_in(
                uow,
                AuditActor::Admin(principal.user_id),
                AdminAction::PublishPlan,
                None,
                format!(
                    "plan={} tier={} price={} trial={}",
                    created.name(),
                    created.tier(),
                    created.price(),
                    created.is_trial()
                ),
                now,
            )
        })?;
        tracing::info!(plan_id = %created.id_typed(), "plan published");
        Ok(created)
    }

    /// Stop offering a plan. Subscriptions already on it are untouched.
    #[tracing::instrument(skip(self), fields(admin = %principal.user_id))]
    pub fn retire(&self, principal: &Principal, plan_id: PlanId) -> ServiceResult<AvailablePlan> {
        principal.require_admin()?;
        let now = self.clock.now();
        self.store.transaction(|uow| {
            let mut plan = uow
                .plan(plan_id)
                .ok_or_else(|| ServiceError::not_found(format!("plan {plan_id}")))?;
            plan.retire()?;
            uow.save_plan(plan.clone())?;
            audit::record_in(
                uow,
                AuditActor::Admin(principal.user_id),
                AdminAction::RetirePlan,
                None,
                format!("plan={} tier={}", plan.name(), plan.tier()),
                now,
            )?;
            Ok(plan)
        })
    }
}
