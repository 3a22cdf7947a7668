mod common;

use chrono::Duration;

use bazaar_accounts::{AdminAction, AuditActor};
use bazaar_billing::{ListingLimit, PlanTier, SubscriptionStatus};
use bazaar_core::{Clock, Money};
use bazaar_engine::ServiceError;
use bazaar_infra::Template;

use common::Harness;

#[tokio::test]
async fn basic_seller_keeps_both_listings_after_trial_expires() {
    let h = Harness::new().with_catalog();
    let seller = h.seller("Anvil").await;

    let trial = h.market.current_subscription(&seller).unwrap().unwrap();
    assert!(trial.is_trial());
    assert_eq!(trial.plan_type(), PlanTier::Basic);

    h.list_products(&seller, 2);
    h.clock.advance(Duration::days(15));

    let report = h.market.sweep_expired_subscriptions(None, h.clock.now()).await.unwrap();
    assert_eq!(report.processed(), 1);
    assert_eq!(report.deactivated_listings(), 0);
    assert_eq!(h.active_products_of(seller.user_id).len(), 2);
    assert!(h.market.current_subscription(&seller).unwrap().is_none());
}

#[tokio::test]
async fn lapsed_standard_seller_falls_back_to_two_oldest_listings() {
    let h = Harness::new().with_catalog();
    let seller = h.seller("Forge").await;

    let change = h
        .market
        .purchase_subscription(&seller, PlanTier::Standard, Money::from_major(1_999))
        .unwrap();
    assert!(change.replaced.as_ref().is_some_and(|s| s.is_trial()));
    assert_eq!(change.subscription.listing_limit(), ListingLimit::Limited(20));

    let listed = h.list_products(&seller, 15);
    assert_eq!(h.active_products_of(seller.user_id).len(), 15);

    h.clock.advance(Duration::days(31));
    let report = h.market.sweep_expired_subscriptions(None, h.clock.now()).await.unwrap();
    assert_eq!(report.processed(), 1);
    assert_eq!(report.deactivated_listings(), 13);

    let mut active: Vec<_> = h
        .active_products_of(seller.user_id)
        .into_iter()
        .map(|p| p.id_typed())
        .collect();
    active.sort();
    let mut oldest = vec![listed[0].id_typed(), listed[1].id_typed()];
    oldest.sort();
    assert_eq!(active, oldest);

    let expired = h.notifier.sent_with(Template::SubscriptionExpired);
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].address, "forge@bazaar.test");
}

#[tokio::test]
async fn repeated_sweeps_are_idempotent() {
    let h = Harness::new().with_catalog();
    let seller = h.seller("Lathe").await;
    h.clock.advance(Duration::days(20));
    let now = h.clock.now();

    let first = h.market.sweep_expired_subscriptions(None, now).await.unwrap();
    let second = h.market.sweep_expired_subscriptions(None, now).await.unwrap();
    assert_eq!(first.processed(), 1);
    assert_eq!(second.processed(), 0);

    let history = h.market.subscription_history(&seller).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status(), SubscriptionStatus::Expired);

    let expiries: Vec<_> = h
        .market
        .admin_logs(&h.admin)
        .unwrap()
        .into_iter()
        .filter(|e| e.action() == AdminAction::ExpireSubscription)
        .collect();
    assert_eq!(expiries.len(), 1);
    assert_eq!(expiries[0].actor(), AuditActor::System);
}

#[tokio::test]
async fn subscription_on_its_end_date_is_not_swept() {
    let h = Harness::new().with_catalog();
    let seller = h.seller("Chisel").await;
    let trial = h.market.current_subscription(&seller).unwrap().unwrap();

    let report = h
        .market
        .sweep_expired_subscriptions(None, trial.end_date())
        .await
        .unwrap();
    assert_eq!(report.processed(), 0);
    assert!(h.market.current_subscription(&seller).unwrap().is_some());
}

#[tokio::test]
async fn manual_sweep_requires_admin_and_is_attributed() {
    let h = Harness::new().with_catalog();
    let seller = h.seller("Rivet").await;
    h.clock.advance(Duration::days(20));

    let denied = h.market.sweep_expired_subscriptions(Some(&seller), h.clock.now()).await;
    assert!(matches!(denied, Err(ServiceError::Auth(_))));

    h.market
        .sweep_expired_subscriptions(Some(&h.admin), h.clock.now())
        .await
        .unwrap();
    let entries = h.market.admin_logs_for(&h.admin, seller.user_id).unwrap();
    assert!(
        entries
            .iter()
            .any(|e| e.action() == AdminAction::ExpireSubscription
                && e.actor() == AuditActor::Admin(h.admin.user_id))
    );
}

#[tokio::test]
async fn downgrade_reenforces_quota_immediately() {
    let h = Harness::new().with_catalog();
    let seller = h.seller("Bolt").await;
    h.market.upgrade_subscription(&seller, PlanTier::Premium).unwrap();
    h.list_products(&seller, 6);

    let change = h.market.upgrade_subscription(&seller, PlanTier::Basic).unwrap();
    assert!(change.in_place);
    assert_eq!(change.deactivated_listings.len(), 4);
    assert_eq!(h.active_products_of(seller.user_id).len(), 2);
}

#[tokio::test]
async fn upgrade_in_place_extends_the_remaining_term() {
    let h = Harness::new().with_catalog();
    let seller = h.seller("Drill").await;
    let trial = h.market.current_subscription(&seller).unwrap().unwrap();

    let change = h.market.upgrade_subscription(&seller, PlanTier::Standard).unwrap();
    assert!(change.in_place);
    assert_eq!(change.subscription.id_typed(), trial.id_typed());
    assert_eq!(change.subscription.plan_type(), PlanTier::Standard);
    assert_eq!(change.subscription.end_date(), trial.end_date() + Duration::days(30));
    assert_eq!(h.market.subscription_history(&seller).unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_drops_to_default_quota() {
    let h = Harness::new().with_catalog();
    let seller = h.seller("Gear").await;
    h.market
        .purchase_subscription(&seller, PlanTier::Standard, Money::from_major(1_999))
        .unwrap();
    h.list_products(&seller, 5);

    let change = h.market.cancel_subscription(&seller).unwrap();
    assert_eq!(change.subscription.status(), SubscriptionStatus::Cancelled);
    assert_eq!(change.deactivated_listings.len(), 3);
    assert!(matches!(
        h.market.cancel_subscription(&seller),
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn purchase_of_unoffered_tier_is_not_found() {
    let h = Harness::new();
    let seller = h.seller("Nail").await;
    let result = h
        .market
        .purchase_subscription(&seller, PlanTier::Premium, Money::from_major(4_999));
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn buyers_cannot_purchase_plans() {
    let h = Harness::new().with_catalog();
    let buyer = h.buyer("Mart").await;
    let result = h
        .market
        .purchase_subscription(&buyer, PlanTier::Basic, Money::from_major(499));
    assert!(matches!(result, Err(ServiceError::Auth(_))));
}

#[tokio::test]
async fn retired_plans_are_hidden_from_the_active_catalog() {
    let h = Harness::new().with_catalog();
    let plans = h.market.list_plans(true).unwrap();
    assert_eq!(plans.len(), 4);
    assert!(plans.windows(2).all(|w| w[0].price() <= w[1].price()));

    let premium = plans.iter().find(|p| p.tier() == PlanTier::Premium).unwrap();
    h.market.retire_plan(&h.admin, premium.id_typed()).unwrap();

    assert_eq!(h.market.list_plans(true).unwrap().len(), 3);
    assert_eq!(h.market.list_plans(false).unwrap().len(), 4);
}
