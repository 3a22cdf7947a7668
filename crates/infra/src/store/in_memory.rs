use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use bazaar_accounts::{AdminLog, User, normalize_email};
use bazaar_billing::{AvailablePlan, Subscription};
use bazaar_core::{
    Entity, ExpectedVersion, InvoiceId, MessageId, PlanId, ProductId, RfqId, SubscriptionId,
    TransactionId, UserId,
};
use bazaar_deals::{ChatMessage, Invoice, Rfq, Transaction};
use bazaar_products::Product;

use super::r#trait::{PurgeReport, Store, StoreError, UnitOfWork};
use crate::retry::RetryPolicy;

/// Every table plus the invoice counter.
#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    plans: BTreeMap<PlanId, AvailablePlan>,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    products: BTreeMap<ProductId, Product>,
    rfqs: BTreeMap<RfqId, Rfq>,
    /// Append order is send order.
    messages: Vec<ChatMessage>,
    transactions: BTreeMap<TransactionId, Transaction>,
    invoices: BTreeMap<InvoiceId, Invoice>,
    admin_logs: Vec<AdminLog>,
    invoice_sequence: u64,
}

#[derive(Debug, Default)]
struct Snapshot {
    revision: u64,
    tables: Tables,
}

/// In-memory store with optimistic concurrency.
///
/// Each unit of work runs against a private copy of the tables taken at some
/// revision. Commit succeeds only if the revision is still current; otherwise
/// the work is re-run on a fresh copy, as many times as the [`RetryPolicy`]
/// allows.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<Snapshot>,
    retry: RetryPolicy,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry_policy(retry: RetryPolicy) -> Self {
        Self {
            state: RwLock::default(),
            retry,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Revision of the last committed unit of work (0 when nothing was written).
    pub fn revision(&self) -> Result<u64, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.revision)
    }

    fn begin(&self) -> Result<(u64, Tables), StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok((state.revision, state.tables.clone()))
    }

    /// Install `tables` if nobody committed since `base`. Returns `false` on a lost race.
    fn commit(&self, base: u64, tables: Tables) -> Result<bool, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if !ExpectedVersion(base).matches(state.revision) {
            return Ok(false);
        }
        state.tables = tables;
        state.revision = base + 1;
        Ok(true)
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

impl Store for InMemoryStore {
    fn transaction<T, E, F>(&self, mut work: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn UnitOfWork) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut retries = 0u32;
        loop {
            let (base, mut tables) = self.begin()?;
            let output = work(&mut tables)?;
            if self.commit(base, tables)? {
                return Ok(output);
            }
            if !self.retry.should_retry(retries) {
                tracing::warn!(retries, "unit of work abandoned after repeated commit conflicts");
                return Err(StoreError::Conflict(format!(
                    "gave up after {} attempts",
                    retries + 1
                ))
                .into());
            }
            retries += 1;
            let delay = self.retry.delay_for_attempt(retries);
            tracing::debug!(retries, delay_ms = delay.as_millis() as u64, "commit conflict, retrying");
            std::thread::sleep(delay);
        }
    }

    fn read<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn UnitOfWork) -> T,
    {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(query(&state.tables))
    }
}

impl UnitOfWork for Tables {
    fn user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).cloned()
    }

    fn user_by_email(&self, email: &str) -> Option<User> {
        let email = normalize_email(email);
        self.users.values().find(|u| u.email == email).cloned()
    }

    fn pending_users(&self) -> Vec<User> {
        self.users
            .values()
            .filter(|u| !u.is_approved)
            .cloned()
            .collect()
    }

    fn save_user(&mut self, user: User) -> Result<(), StoreError> {
        if self
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::UniqueViolation(format!(
                "email {} is already registered",
                user.email
            )));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    fn purge_user(&mut self, id: UserId) -> PurgeReport {
        let mut report = PurgeReport::default();
        if self.users.remove(&id).is_some() {
            report.users = 1;
        }

        let products_before = self.products.len();
        self.products.retain(|_, p| p.seller_id() != id);
        report.products = products_before - self.products.len();

        let owned_rfqs: BTreeSet<RfqId> = self
            .rfqs
            .values()
            .filter(|r| r.buyer_id() == id)
            .map(|r| r.id_typed())
            .collect();
        self.rfqs.retain(|rfq_id, _| !owned_rfqs.contains(rfq_id));
        report.rfqs = owned_rfqs.len();

        let messages_before = self.messages.len();
        self.messages.retain(|m| {
            m.sender_id() != id && m.receiver_id() != id && !owned_rfqs.contains(&m.rfq_id())
        });
        report.messages = messages_before - self.messages.len();

        report
    }

    fn plans(&self) -> Vec<AvailablePlan> {
        self.plans.values().cloned().collect()
    }

    fn plan(&self, id: PlanId) -> Option<AvailablePlan> {
        self.plans.get(&id).cloned()
    }

    fn save_plan(&mut self, plan: AvailablePlan) -> Result<(), StoreError> {
        if self
            .plans
            .values()
            .any(|p| p.id_typed() != plan.id_typed() && p.name().eq_ignore_ascii_case(plan.name()))
        {
            return Err(StoreError::UniqueViolation(format!(
                "plan name {} is taken",
                plan.name()
            )));
        }
        self.plans.insert(plan.id_typed(), plan);
        Ok(())
    }

    fn subscription(&self, id: SubscriptionId) -> Option<Subscription> {
        self.subscriptions.get(&id).cloned()
    }

    fn subscriptions_for(&self, user: UserId) -> Vec<Subscription> {
        let mut history: Vec<Subscription> = self
            .subscriptions
            .values()
            .filter(|s| s.user_id() == user)
            .cloned()
            .collect();
        history.sort_by(|a, b| {
            a.start_date()
                .cmp(&b.start_date())
                .then(a.id_typed().cmp(&b.id_typed()))
        });
        history
    }

    fn active_subscription(&self, user: UserId) -> Option<Subscription> {
        self.subscriptions
            .values()
            .find(|s| s.user_id() == user && s.is_active())
            .cloned()
    }

    fn lapsed_subscriptions(&self, now: DateTime<Utc>) -> Vec<Subscription> {
        self.subscriptions
            .values()
            .filter(|s| s.is_lapsed(now))
            .cloned()
            .collect()
    }

    fn save_subscription(&mut self, subscription: Subscription) -> Result<(), StoreError> {
        if subscription.is_active()
            && self.subscriptions.values().any(|s| {
                s.id_typed() != subscription.id_typed()
                    && s.user_id() == subscription.user_id()
                    && s.is_active()
            })
        {
            return Err(StoreError::UniqueViolation(format!(
                "user {} already has an active subscription",
                subscription.user_id()
            )));
        }
        self.subscriptions
            .insert(subscription.id_typed(), subscription);
        Ok(())
    }

    fn product(&self, id: ProductId) -> Option<Product> {
        self.products.get(&id).cloned()
    }

    fn products_by_seller(&self, seller: UserId) -> Vec<Product> {
        self.products
            .values()
            .filter(|p| p.seller_id() == seller)
            .cloned()
            .collect()
    }

    fn save_product(&mut self, product: Product) -> Result<(), StoreError> {
        self.products.insert(product.id_typed(), product);
        Ok(())
    }

    fn rfq(&self, id: RfqId) -> Option<Rfq> {
        self.rfqs.get(&id).cloned()
    }

    fn save_rfq(&mut self, rfq: Rfq) -> Result<(), StoreError> {
        self.rfqs.insert(rfq.id_typed(), rfq);
        Ok(())
    }

    fn message(&self, id: MessageId) -> Option<ChatMessage> {
        self.messages.iter().find(|m| m.id_typed() == id).cloned()
    }

    fn messages_for(&self, rfq: RfqId) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.rfq_id() == rfq)
            .cloned()
            .collect()
    }

    fn save_message(&mut self, message: ChatMessage) -> Result<(), StoreError> {
        match self
            .messages
            .iter_mut()
            .find(|m| m.same_row(&message))
        {
            Some(existing) => {
                if existing.body() != message.body() || existing.sender_id() != message.sender_id() {
                    return Err(StoreError::Backend(
                        "chat messages are append-only; only the read flag may change".to_string(),
                    ));
                }
                *existing = message;
            }
            None => self.messages.push(message),
        }
        Ok(())
    }

    fn find_transaction(&self, id: TransactionId) -> Option<Transaction> {
        self.transactions.get(&id).cloned()
    }

    fn save_transaction(&mut self, transaction: Transaction) -> Result<(), StoreError> {
        self.transactions
            .insert(transaction.id_typed(), transaction);
        Ok(())
    }

    fn next_invoice_sequence(&mut self) -> u64 {
        self.invoice_sequence += 1;
        self.invoice_sequence
    }

    fn insert_invoice(&mut self, invoice: Invoice) -> Result<(), StoreError> {
        for existing in self.invoices.values() {
            if existing.number() == invoice.number() {
                return Err(StoreError::UniqueViolation(format!(
                    "invoice number {} already issued",
                    invoice.number()
                )));
            }
            if existing.transaction_id() == invoice.transaction_id() {
                return Err(StoreError::UniqueViolation(format!(
                    "transaction {} is already invoiced",
                    invoice.transaction_id()
                )));
            }
        }
        self.invoices.insert(invoice.id_typed(), invoice);
        Ok(())
    }

    fn invoice_for(&self, transaction: TransactionId) -> Option<Invoice> {
        self.invoices
            .values()
            .find(|i| i.transaction_id() == transaction)
            .cloned()
    }

    fn invoices(&self) -> Vec<Invoice> {
        self.invoices.values().cloned().collect()
    }

    fn append_admin_log(&mut self, entry: AdminLog) -> Result<(), StoreError> {
        let id = entry.id_typed();
        if self.admin_logs.iter().any(|e| e.id_typed() == id) {
            return Err(StoreError::UniqueViolation(format!(
                "admin log entry {id} already recorded"
            )));
        }
        self.admin_logs.push(entry);
        Ok(())
    }

    fn admin_logs(&self) -> Vec<AdminLog> {
        self.admin_logs.clone()
    }
}
