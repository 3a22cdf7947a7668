#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use bazaar_auth::{Principal, Role};
use bazaar_billing::{NewPlan, PlanFeature, PlanTier};
use bazaar_core::{FixedClock, Money, UserId};
use bazaar_deals::NewRfq;
use bazaar_engine::{Marketplace, SignupRequest};
use bazaar_infra::{
    InMemoryIdentity, InMemoryStore, MarketplaceConfig, RecordingNotifier, RetryPolicy, Store,
};
use bazaar_products::{NewListing, Product};

pub const PASSWORD: &str = "correct-horse-battery";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

/// An engine over an in-memory store, a manual clock and a recording notifier.
pub struct Harness<S = InMemoryStore> {
    pub market: Arc<Marketplace<S>>,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub admin: Principal,
}

impl Harness<InMemoryStore> {
    pub fn new() -> Self {
        Self::build(InMemoryStore::new(), RecordingNotifier::new())
    }

    /// Store that keeps retrying under heavy contention.
    pub fn contended() -> Self {
        Self::build(
            InMemoryStore::with_retry_policy(RetryPolicy::fixed(500, Duration::from_micros(200))),
            RecordingNotifier::new(),
        )
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self::build(InMemoryStore::new(), notifier)
    }
}

impl<S: Store + 'static> Harness<S> {
    /// An engine over a caller-supplied store.
    pub fn over(store: S) -> Self {
        Self::build(store, RecordingNotifier::new())
    }

    fn build(store: S, notifier: RecordingNotifier) -> Self {
        let clock = Arc::new(FixedClock::new(t0()));
        let notifier = Arc::new(notifier);
        let config = MarketplaceConfig {
            notify_timeout: Duration::from_millis(100),
            ..MarketplaceConfig::default()
        };
        let market = Arc::new(Marketplace::new(
            Arc::new(store),
            Arc::new(InMemoryIdentity::new()),
            notifier.clone(),
            clock.clone(),
            &config,
        ));
        let admin = market
            .bootstrap_admin("Operations", "ops@bazaar.test", PASSWORD)
            .unwrap()
            .principal();
        Self {
            market,
            clock,
            notifier,
            admin,
        }
    }

    /// Catalog with a free BASIC trial and one paid plan per tier.
    pub fn with_catalog(self) -> Self {
        let plans = [
            ("Basic Trial", PlanTier::Basic, 0, 30, true, Some(14)),
            ("Basic", PlanTier::Basic, 499, 30, false, None),
            ("Standard", PlanTier::Standard, 1_999, 30, false, None),
            ("Premium", PlanTier::Premium, 4_999, 30, false, None),
        ];
        for (name, tier, price, days, is_trial, trial_days) in plans {
            self.market
                .publish_plan(
                    &self.admin,
                    NewPlan {
                        name: name.to_string(),
                        tier,
                        price: Money::from_major(price),
                        duration_days: days,
                        features: vec![PlanFeature::included("rfq_access")],
                        is_trial,
                        trial_days,
                    },
                )
                .unwrap();
        }
        self
    }

    pub async fn signup(&self, name: &str, role: Role) -> bazaar_accounts::User {
        self.market
            .signup(SignupRequest {
                name: name.to_string(),
                email: format!("{}@bazaar.test", name.to_lowercase()),
                phone: "+91 98000 00000".to_string(),
                password: PASSWORD.to_string(),
                role,
                seller_plan: None,
            })
            .await
            .unwrap()
            .user
    }

    /// Registered and approved seller.
    pub async fn seller(&self, name: &str) -> Principal {
        let user = self.signup(name, Role::Seller).await;
        self.market.approve_user(&self.admin, user.id).await.unwrap();
        user.principal()
    }

    pub async fn buyer(&self, name: &str) -> Principal {
        self.signup(name, Role::Buyer).await.principal()
    }

    /// Create `count` listings one second apart so their age order is unambiguous.
    pub fn list_products(&self, seller: &Principal, count: usize) -> Vec<Product> {
        (0..count)
            .map(|i| {
                self.clock.advance(chrono::Duration::seconds(1));
                self.market
                    .create_product(seller, listing(&format!("Item {i}")))
                    .unwrap()
            })
            .collect()
    }

    pub fn products_of(&self, seller: UserId) -> Vec<Product> {
        self.market
            .store()
            .read(|uow| uow.products_by_seller(seller))
            .unwrap()
    }

    pub fn active_products_of(&self, seller: UserId) -> Vec<Product> {
        self.products_of(seller)
            .into_iter()
            .filter(|p| p.is_active())
            .collect()
    }
}

pub fn listing(name: &str) -> NewListing {
    NewListing {
        name: name.to_string(),
        description: "Industrial grade".to_string(),
        category: "Metals".to_string(),
        price: Money::from_major(1_200),
        unit: "tonne".to_string(),
        min_order_quantity: 1,
    }
}

pub fn rfq(title: &str) -> NewRfq {
    NewRfq {
        title: title.to_string(),
        description: "Monthly supply contract".to_string(),
        category: "Metals".to_string(),
        quantity: 100,
        unit: "tonne".to_string(),
        budget: Some(Money::from_major(60_000)),
        deadline: None,
    }
}
