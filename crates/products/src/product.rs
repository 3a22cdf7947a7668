use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_billing::ListingLimit;
use bazaar_core::{DomainError, DomainResult, Entity, Money, ProductId, UserId};

/// Listing fields supplied by a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewListing {
    pub name: String,
    pub description: String,
    pub category: String,
    /// Price per unit in smallest currency unit.
    pub price: Money,
    pub unit: String,
    pub min_order_quantity: u32,
}

/// A seller's product listing.
///
/// Only `is_active` listings count against the seller's quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    seller_id: UserId,
    name: String,
    description: String,
    category: String,
    price: Money,
    unit: String,
    min_order_quantity: u32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Product {
    /// Create an active listing. The quota check happens in the caller's unit of work.
    pub fn list(
        id: ProductId,
        seller_id: UserId,
        listing: NewListing,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if listing.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if listing.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if listing.unit.trim().is_empty() {
            return Err(DomainError::validation("unit cannot be empty"));
        }
        if listing.price.is_zero() {
            return Err(DomainError::validation("price must be positive"));
        }
        if listing.min_order_quantity == 0 {
            return Err(DomainError::validation("minimum order quantity must be positive"));
        }

        Ok(Self {
            id,
            seller_id,
            name: listing.name.trim().to_string(),
            description: listing.description.trim().to_string(),
            category: listing.category.trim().to_string(),
            price: listing.price,
            unit: listing.unit.trim().to_string(),
            min_order_quantity: listing.min_order_quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn seller_id(&self) -> UserId {
        self.seller_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn min_order_quantity(&self) -> u32 {
        self.min_order_quantity
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn activate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.is_active {
            return Err(DomainError::conflict("listing is already active"));
        }
        self.is_active = true;
        self.updated_at = now;
        Ok(())
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::conflict("listing is already inactive"));
        }
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Active listings that must be switched off to fit within `limit`.
///
/// The oldest listings stay active. Ties on `created_at` are broken by id, which
/// is time-ordered, so the selection is stable across repeated runs.
pub fn listings_over_quota(products: &[Product], limit: ListingLimit) -> Vec<ProductId> {
    let mut active: Vec<&Product> = products.iter().filter(|p| p.is_active).collect();
    let excess = limit.excess(active.len());
    if excess == 0 {
        return Vec::new();
    }
    active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    let keep = active.len() - excess;
    active.into_iter().skip(keep).map(|p| p.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn listing(name: &str) -> NewListing {
        NewListing {
            name: name.to_string(),
            description: "Cold rolled steel coil".to_string(),
            category: "Metals".to_string(),
            price: Money::from_major(1_200),
            unit: "tonne".to_string(),
            min_order_quantity: 5,
        }
    }

    fn listed(seller: UserId, name: &str, at: DateTime<Utc>) -> Product {
        Product::list(ProductId::new(), seller, listing(name), at).unwrap()
    }

    #[test]
    fn list_creates_active_listing() {
        let p = listed(UserId::new(), "Steel coil", t0());
        assert!(p.is_active());
        assert_eq!(p.name(), "Steel coil");
        assert_eq!(p.unit(), "tonne");
    }

    #[test]
    fn list_validates_fields() {
        let mut bad = listing("  ");
        assert!(matches!(
            Product::list(ProductId::new(), UserId::new(), bad.clone(), t0()),
            Err(DomainError::Validation(_))
        ));
        bad.name = "Coil".into();
        bad.price = Money::ZERO;
        assert!(Product::list(ProductId::new(), UserId::new(), bad, t0()).is_err());
    }

    #[test]
    fn toggling_twice_conflicts() {
        let mut p = listed(UserId::new(), "Coil", t0());
        p.deactivate(t0()).unwrap();
        assert!(matches!(p.deactivate(t0()), Err(DomainError::Conflict(_))));
        p.activate(t0()).unwrap();
        assert!(matches!(p.activate(t0()), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn newest_listings_are_deactivated_first() {
        let seller = UserId::new();
        let products: Vec<Product> = (0..5)
            .map(|i| listed(seller, &format!("p{i}"), t0() + Duration::minutes(i)))
            .collect();
        let over = listings_over_quota(&products, ListingLimit::Limited(2));
        let expected: Vec<ProductId> = products[2..].iter().map(|p| p.id_typed()).collect();
        assert_eq!(over, expected);
    }

    #[test]
    fn inactive_listings_do_not_count() {
        let seller = UserId::new();
        let mut products: Vec<Product> = (0..3)
            .map(|i| listed(seller, &format!("p{i}"), t0() + Duration::minutes(i)))
            .collect();
        products[0].deactivate(t0()).unwrap();
        assert!(listings_over_quota(&products, ListingLimit::Limited(2)).is_empty());
    }

    #[test]
    fn same_timestamp_falls_back_to_id_order() {
        let seller = UserId::new();
        let products: Vec<Product> = (0..3).map(|i| listed(seller, &format!("p{i}"), t0())).collect();
        let over = listings_over_quota(&products, ListingLimit::Limited(1));
        assert_eq!(over, vec![products[1].id_typed(), products[2].id_typed()]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: after removing the selection, the active count fits the limit
            /// and the survivors are exactly the oldest ones.
            #[test]
            fn selection_fits_limit(
                offsets in proptest::collection::vec(0i64..10_000, 0..40),
                limit in 0u32..25
            ) {
                let seller = UserId::new();
                let products: Vec<Product> = offsets
                    .iter()
                    .map(|o| listed(seller, "p", t0() + Duration::seconds(*o)))
                    .collect();
                let over = listings_over_quota(&products, ListingLimit::Limited(limit));
                let remaining = products.len() - over.len();
                prop_assert!(remaining <= limit as usize);
                prop_assert_eq!(over.len(), products.len().saturating_sub(limit as usize));

                let newest_kept = products
                    .iter()
                    .filter(|p| !over.contains(&p.id_typed()))
                    .map(|p| (p.created_at(), p.id_typed()))
                    .max();
                let oldest_dropped = products
                    .iter()
                    .filter(|p| over.contains(&p.id_typed()))
                    .map(|p| (p.created_at(), p.id_typed()))
                    .min();
                if let (Some(kept), Some(dropped)) = (newest_kept, oldest_dropped) {
                    prop_assert!(kept < dropped);
                }
            }

            /// Property: selection is repeatable.
            #[test]
            fn selection_is_deterministic(count in 0usize..30, limit in 0u32..10) {
                let seller = UserId::new();
                let products: Vec<Product> = (0..count)
                    .map(|i| listed(seller, "p", t0() + Duration::seconds((i % 3) as i64)))
                    .collect();
                let first = listings_over_quota(&products, ListingLimit::Limited(limit));
                let second = listings_over_quota(&products, ListingLimit::Limited(limit));
                prop_assert_eq!(first, second);
            }
        }
    }
}
