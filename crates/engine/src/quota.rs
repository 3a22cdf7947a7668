//! Listing Quota Enforcer.
//!
//! A seller's quota is the listing limit of their ACTIVE subscription tier, or
//! the BASIC default when they hold none. It is recomputed from the store on
//! every call; nothing is cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use bazaar_accounts::{AdminAction, AuditActor};
use bazaar_auth::Principal;
use bazaar_billing::{DEFAULT_LISTING_LIMIT, ListingLimit};
use bazaar_core::{Clock, ProductId, UserId};
use bazaar_infra::{Store, UnitOfWork};
use bazaar_products::{NewListing, Product, listings_over_quota};

use crate::audit;
use crate::error::{ServiceError, ServiceResult};

/// Quota currently granted to `seller`.
pub(crate) fn quota_in(uow: &dyn UnitOfWork, seller: UserId) -> ListingLimit {
    uow.active_subscription(seller)
        .map(|s| s.listing_limit())
        .unwrap_or(DEFAULT_LISTING_LIMIT)
}

fn active_listings(uow: &dyn UnitOfWork, seller: UserId) -> usize {
    uow.products_by_seller(seller)
        .iter()
        .filter(|p| p.is_active())
        .count()
}

/// Deactivate listings above `limit`, newest first. Returns what was switched off.
pub(crate) fn enforce_in(
    uow: &mut dyn UnitOfWork,
    seller: UserId,
    limit: ListingLimit,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<ProductId>> {
    let products = uow.products_by_seller(seller);
    let excess = listings_over_quota(&products, limit);
    for id in &excess {
        if let Some(mut product) = products.iter().find(|p| p.id_typed() == *id).cloned() {
            product.deactivate(now)?;
            uow.save_product(product)?;
        }
    }
    if !excess.is_empty() {
        tracing::info!(%seller, ?limit, deactivated = excess.len(), "listings deactivated to fit quota");
    }
    Ok(excess)
}

fn ensure_room(uow: &dyn UnitOfWork, seller: UserId) -> ServiceResult<()> {
    let limit = quota_in(uow, seller);
    let active = active_listings(uow, seller);
    tracing::debug!(%seller, ?limit, active, "quota check");
    if limit.allows_another(active) {
        Ok(())
    } else {
        Err(ServiceError::conflict(format!(
            "listing quota exceeded: {active} active listings, plan allows {limit:?}"
        )))
    }
}

pub struct ListingQuotaEnforcer<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> ListingQuotaEnforcer<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn quota_for(&self, seller: UserId) -> ServiceResult<ListingLimit> {
        Ok(self.store.read(|uow| quota_in(uow, seller))?)
    }

    /// Advisory: may change before the caller acts. Creation re-checks atomically.
    pub fn can_activate(&self, seller: UserId) -> ServiceResult<bool> {
        Ok(self.store.read(|uow| {
            quota_in(uow, seller).allows_another(active_listings(uow, seller))
        })?)
    }

    /// Bring `seller` back within their current quota.
    #[tracing::instrument(skip(self))]
    pub fn enforce_quota(&self, seller: UserId) -> ServiceResult<Vec<ProductId>> {
        let now = self.clock.now();
        self.store.transaction(|uow| {
            let limit = quota_in(uow, seller);
            enforce_in(uow, seller, limit, now)
        })
    }

    /// Create an active listing if the seller has a free slot.
    ///
    /// The slot check and the insert commit together, so two concurrent requests
    /// cannot both take the last slot.
    #[tracing::instrument(skip(self, listing), fields(seller = %principal.user_id))]
    pub fn create_product(&self, principal: &Principal, listing: NewListing) -> ServiceResult<Product> {
        principal.require_seller()?;
        let now = self.clock.now();
        let product = self.store.transaction(|uow| {
            let seller = uow
                .user(principal.user_id)
                .ok_or_else(|| ServiceError::not_found("seller account"))?;
            seller.ensure_active_seller()?;
            ensure_room(uow, seller.id)?;
            let product = Product::list(ProductId::new(), seller.id, listing.clone(), now)?;
            uow.save_product(product.clone())?;
            Ok::<_, ServiceError>(product)
        })?;
        tracing::info!(product = %product.id_typed(), "listing created");
        Ok(product)
    }

    /// Toggle a listing. Owners need a free slot to reactivate; admin toggles are audited.
    #[tracing::instrument(skip(self), fields(actor = %principal.user_id))]
    pub fn set_listing_active(
        &self,
        principal: &Principal,
        product_id: ProductId,
        active: bool,
    ) -> ServiceResult<Product> {
        let now = self.clock.now();
        self.store.transaction(|uow| {
            let mut product = uow
                .product(product_id)
                .ok_or_else(|| ServiceError::not_found(format!("product {product_id}")))?;
            principal.require_self_or_admin(product.seller_id())?;

            if active {
                product.activate(now)?;
                ensure_room(uow, product.seller_id())?;
            } else {
                product.deactivate(now)?;
            }
            uow.save_product(product.clone())?;

            if principal.role.is_admin() && principal.user_id != product.seller_id() {
                audit::record_in(
                    uow,
                    AuditActor::Admin(principal.user_id),
                    AdminAction::ToggleListing,
                    Some(product.seller_id()),
                    format!("product={} active={active}", product.id_typed()),
                    now,
                )?;
            }
            Ok(product)
        })
    }
}
