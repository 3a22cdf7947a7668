use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use bazaar_accounts::{AdminLog, User};
use bazaar_billing::{AvailablePlan, Subscription};
use bazaar_core::{
    MessageId, PlanId, ProductId, RfqId, SubscriptionId, TransactionId, UserId,
};
use bazaar_deals::{ChatMessage, Invoice, Rfq, Transaction};
use bazaar_products::Product;

/// Persistence failure.
///
/// These are **infrastructure errors**: they describe what the store refused or
/// could not do, not which business rule a caller broke.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The unit of work lost every commit race the retry policy allowed.
    #[error("concurrent update conflict: {0}")]
    Conflict(String),

    /// A write would break a uniqueness constraint the store owns.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The backend itself failed (poisoned lock, IO, ...).
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Rows removed by [`UnitOfWork::purge_user`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub users: usize,
    pub products: usize,
    pub rfqs: usize,
    pub messages: usize,
}

/// Table access inside one atomic unit of work.
///
/// Reads return owned copies; writes are only visible to other callers once the
/// surrounding [`Store::transaction`] commits.
///
/// ## Constraints enforced by the store
///
/// - user emails are unique
/// - at most one ACTIVE subscription per user
/// - invoice numbers are unique, and each transaction has at most one invoice
/// - admin log entries are append-only
/// - subscriptions are never deleted (there is no delete operation)
pub trait UnitOfWork {
    // users
    fn user(&self, id: UserId) -> Option<User>;
    fn user_by_email(&self, email: &str) -> Option<User>;
    /// Accounts still waiting for approval.
    fn pending_users(&self) -> Vec<User>;
    /// Insert or replace a user.
    fn save_user(&mut self, user: User) -> Result<(), StoreError>;
    /// Delete a user with every row that belongs to them (listings, RFQs and
    /// messages). Subscriptions, transactions, invoices and audit entries stay.
    fn purge_user(&mut self, id: UserId) -> PurgeReport;

    // plan catalog
    fn plans(&self) -> Vec<AvailablePlan>;
    fn plan(&self, id: PlanId) -> Option<AvailablePlan>;
    fn save_plan(&mut self, plan: AvailablePlan) -> Result<(), StoreError>;

    // subscriptions
    fn subscription(&self, id: SubscriptionId) -> Option<Subscription>;
    /// Every subscription the user ever held, oldest first.
    fn subscriptions_for(&self, user: UserId) -> Vec<Subscription>;
    fn active_subscription(&self, user: UserId) -> Option<Subscription>;
    /// ACTIVE subscriptions whose `end_date` is before `now`.
    fn lapsed_subscriptions(&self, now: DateTime<Utc>) -> Vec<Subscription>;
    fn save_subscription(&mut self, subscription: Subscription) -> Result<(), StoreError>;

    // listings
    fn product(&self, id: ProductId) -> Option<Product>;
    fn products_by_seller(&self, seller: UserId) -> Vec<Product>;
    fn save_product(&mut self, product: Product) -> Result<(), StoreError>;

    // RFQs and chat
    fn rfq(&self, id: RfqId) -> Option<Rfq>;
    fn save_rfq(&mut self, rfq: Rfq) -> Result<(), StoreError>;
    fn message(&self, id: MessageId) -> Option<ChatMessage>;
    /// Messages on one RFQ in the order they were sent.
    fn messages_for(&self, rfq: RfqId) -> Vec<ChatMessage>;
    fn save_message(&mut self, message: ChatMessage) -> Result<(), StoreError>;

    // transactions and invoices
    fn find_transaction(&self, id: TransactionId) -> Option<Transaction>;
    fn save_transaction(&mut self, transaction: Transaction) -> Result<(), StoreError>;
    /// Next value of the store-wide invoice counter (starts at 1, never reused).
    fn next_invoice_sequence(&mut self) -> u64;
    fn insert_invoice(&mut self, invoice: Invoice) -> Result<(), StoreError>;
    fn invoice_for(&self, transaction: TransactionId) -> Option<Invoice>;
    fn invoices(&self) -> Vec<Invoice>;

    // audit
    fn append_admin_log(&mut self, entry: AdminLog) -> Result<(), StoreError>;
    /// Audit entries in the order they were recorded.
    fn admin_logs(&self) -> Vec<AdminLog>;
}

/// Transactional persistence boundary.
///
/// ## Transaction Semantics
///
/// `transaction()` runs `work` against a private view of every table. When it
/// returns `Ok`, all of its writes become visible at once; when it returns `Err`,
/// none do. If another writer committed in between, the implementation may
/// discard the view and run `work` again, so `work` must be side-effect free
/// outside the unit of work. Once the retry budget is spent the caller gets
/// [`StoreError::Conflict`] (converted into `E`).
///
/// `read()` runs a query against a consistent snapshot without taking part in
/// the commit protocol.
pub trait Store: Send + Sync {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn UnitOfWork) -> Result<T, E>,
        E: From<StoreError>;

    fn read<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn UnitOfWork) -> T;
}

impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn UnitOfWork) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).transaction(work)
    }

    fn read<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn UnitOfWork) -> T,
    {
        (**self).read(query)
    }
}
