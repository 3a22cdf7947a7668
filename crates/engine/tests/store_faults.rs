//! Engine behaviour when the store refuses or stalls a unit of work.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use bazaar_auth::Role;
use bazaar_core::Clock;
use bazaar_engine::ServiceError;
use bazaar_infra::{InMemoryStore, Store, StoreError, Template, UnitOfWork};

use common::Harness;

const DISARMED: usize = usize::MAX;

/// In-memory store that can refuse one upcoming unit of work, or stall all of them.
struct FaultyStore {
    inner: InMemoryStore,
    /// Units of work still let through before the next one is refused.
    allowed_before_refusal: AtomicUsize,
    stall_ms: AtomicU64,
}

impl FaultyStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            allowed_before_refusal: AtomicUsize::new(DISARMED),
            stall_ms: AtomicU64::new(0),
        }
    }

    fn refuse_after(&self, allowed: usize) {
        self.allowed_before_refusal.store(allowed, Ordering::SeqCst);
    }

    fn stall(&self, by: Duration) {
        self.stall_ms.store(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Store for FaultyStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn UnitOfWork) -> Result<T, E>,
        E: From<StoreError>,
    {
        let stall = self.stall_ms.load(Ordering::SeqCst);
        if stall > 0 {
            std::thread::sleep(Duration::from_millis(stall));
        }
        match self.allowed_before_refusal.load(Ordering::SeqCst) {
            DISARMED => {}
            0 => {
                self.allowed_before_refusal.store(DISARMED, Ordering::SeqCst);
                return Err(StoreError::Conflict("lost the commit race".into()).into());
            }
            remaining => self.allowed_before_refusal.store(remaining - 1, Ordering::SeqCst),
        }
        self.inner.transaction(work)
    }

    fn read<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn UnitOfWork) -> T,
    {
        self.inner.read(query)
    }
}

#[tokio::test]
async fn sweep_reports_and_notifies_expiries_committed_before_a_failure() {
    let h = Harness::over(FaultyStore::new()).with_catalog();
    h.seller("Kettle").await;
    h.seller("Ladle").await;
    h.clock.advance(chrono::Duration::days(15));
    let now = h.clock.now();

    h.market.store().refuse_after(1);
    let first = h.market.sweep_expired_subscriptions(None, now).await.unwrap();
    assert_eq!(first.processed(), 1);
    assert_eq!(first.failed.len(), 1);
    assert!(matches!(first.failed[0].error, ServiceError::Conflict(_)));
    assert_eq!(h.notifier.sent_with(Template::SubscriptionExpired).len(), 1);

    // The refused row is still lapsed and the next run finishes it.
    let second = h.market.sweep_expired_subscriptions(None, now).await.unwrap();
    assert_eq!(second.processed(), 1);
    assert!(second.failed.is_empty());
    assert_eq!(
        second.expired[0].subscription.id_typed(),
        first.failed[0].subscription
    );

    let notified: HashSet<String> = h
        .notifier
        .sent_with(Template::SubscriptionExpired)
        .into_iter()
        .map(|n| n.address)
        .collect();
    let expected: HashSet<String> = ["kettle@bazaar.test", "ladle@bazaar.test"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(notified, expected);
}

#[tokio::test]
async fn slow_commits_do_not_hold_the_executor() {
    let h = Harness::over(FaultyStore::new()).with_catalog();
    let pending = h.signup("Pacer", Role::Seller).await;
    h.market.store().stall(Duration::from_millis(300));

    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();
    let ticker = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    h.market.approve_user(&h.admin, pending.id).await.unwrap();
    ticker.abort();

    // Single-threaded runtime: the ticker only runs while the approval is parked.
    assert!(ticks.load(Ordering::SeqCst) >= 5);
}
