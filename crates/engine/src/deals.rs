//! Deal Pipeline: RFQ -> negotiation -> transaction + invoice.

use std::sync::Arc;

use serde::Serialize;

use bazaar_accounts::{AdminAction, AuditActor};
use bazaar_auth::Principal;
use bazaar_core::{Clock, InvoiceId, MessageId, RfqId, TransactionId};
use bazaar_deals::{ChatMessage, DealTerms, Invoice, NewRfq, Rfq, Transaction, route_message};
use bazaar_infra::{Store, UnitOfWork};

use crate::audit;
use crate::error::{ServiceError, ServiceResult};

/// A created transaction with its invoice; both committed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReceipt {
    pub transaction: Transaction,
    pub invoice: Invoice,
}

fn approved_account(uow: &dyn UnitOfWork, principal: &Principal) -> ServiceResult<()> {
    let user = uow
        .user(principal.user_id)
        .ok_or_else(|| ServiceError::not_found(format!("user {}", principal.user_id)))?;
    if !user.is_approved {
        return Err(ServiceError::forbidden("account is pending approval"));
    }
    Ok(())
}

fn load_rfq(uow: &dyn UnitOfWork, id: RfqId) -> ServiceResult<Rfq> {
    uow.rfq(id)
        .ok_or_else(|| ServiceError::not_found(format!("rfq {id}")))
}

pub struct DealPipeline<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for DealPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S: Store> DealPipeline<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[tracing::instrument(skip(self, rfq), fields(buyer = %principal.user_id))]
    pub fn create_rfq(&self, principal: &Principal, rfq: NewRfq) -> ServiceResult<Rfq> {
        principal.require_buyer()?;
        let now = self.clock.now();
        let created = self.store.transaction(|uow| {
            approved_account(uow, principal)?;
            let rfq = Rfq::open(RfqId::new(), principal.user_id, rfq.clone(), now)?;
            uow.save_rfq(rfq.clone())?;
            Ok::<_, ServiceError>(rfq)
        })?;
        tracing::info!(rfq = %created.id_typed(), "rfq opened");
        Ok(created)
    }

    pub fn rfq(&self, principal: &Principal, id: RfqId) -> ServiceResult<Rfq> {
        let rfq = self.store.read(|uow| uow.rfq(id))?
            .ok_or_else(|| ServiceError::not_found(format!("rfq {id}")))?;
        // Open RFQs are visible to any seller so they can respond.
        if !(principal.role.is_admin() || principal.role.can_sell() || rfq.buyer_id() == principal.user_id) {
            return Err(ServiceError::forbidden("not a participant of this RFQ"));
        }
        Ok(rfq)
    }

    /// Append a message. Sellers always write to the buyer; the buyer writes to
    /// the first seller who responded.
    #[tracing::instrument(skip(self, body), fields(sender = %principal.user_id))]
    pub fn post_message(&self, principal: &Principal, rfq_id: RfqId, body: &str) -> ServiceResult<ChatMessage> {
        let now = self.clock.now();
        self.store.transaction(|uow| {
            let mut rfq = load_rfq(uow, rfq_id)?;
            if rfq.buyer_id() != principal.user_id {
                let seller = uow
                    .user(principal.user_id)
                    .ok_or_else(|| ServiceError::not_found(format!("user {}", principal.user_id)))?;
                seller.ensure_active_seller()?;
            }
            let message = route_message(&mut rfq, principal, body, now)?;
            uow.save_rfq(rfq)?;
            uow.save_message(message.clone())?;
            Ok(message)
        })
    }

    /// Messages visible to `principal`: everything for the buyer and admins, a
    /// seller's own thread otherwise.
    pub fn messages(&self, principal: &Principal, rfq_id: RfqId) -> ServiceResult<Vec<ChatMessage>> {
        let (rfq, messages) = self
            .store
            .read(|uow| (uow.rfq(rfq_id), uow.messages_for(rfq_id)))?;
        let rfq = rfq.ok_or_else(|| ServiceError::not_found(format!("rfq {rfq_id}")))?;
        if principal.role.is_admin() || rfq.buyer_id() == principal.user_id {
            return Ok(messages);
        }
        Ok(messages
            .into_iter()
            .filter(|m| m.sender_id() == principal.user_id || m.receiver_id() == principal.user_id)
            .collect())
    }

    pub fn mark_read(&self, principal: &Principal, message_id: MessageId) -> ServiceResult<ChatMessage> {
        self.store.transaction(|uow| {
            let mut message = uow
                .message(message_id)
                .ok_or_else(|| ServiceError::not_found(format!("message {message_id}")))?;
            message.mark_read(principal.user_id)?;
            uow.save_message(message.clone())?;
            Ok(message)
        })
    }

    /// Price the deal, issue its invoice, and approve the referenced RFQ, all in
    /// one unit of work.
    #[tracing::instrument(skip(self, terms), fields(buyer = %principal.user_id, seller = %terms.seller_id))]
    pub fn create_transaction(&self, principal: &Principal, terms: DealTerms) -> ServiceResult<TransactionReceipt> {
        principal.require_buyer()?;
        let now = self.clock.now();
        let receipt = self.store.transaction(|uow| {
            approved_account(uow, principal)?;

            let seller = uow
                .user(terms.seller_id)
                .ok_or_else(|| ServiceError::not_found(format!("seller {}", terms.seller_id)))?;
            if !seller.role.can_sell() || !seller.is_approved {
                return Err(ServiceError::validation("counterparty is not an approved seller"));
            }

            if let Some(rfq_id) = terms.rfq_id {
                let mut rfq = load_rfq(uow, rfq_id)?;
                if rfq.buyer_id() != principal.user_id {
                    return Err(ServiceError::forbidden("only the RFQ's buyer can close a deal on it"));
                }
                if let Some(counterparty) = rfq.counterparty_seller_id() {
                    if counterparty != terms.seller_id {
                        return Err(ServiceError::validation(
                            "seller is not the counterparty negotiating this RFQ",
                        ));
                    }
                }
                rfq.approve(now)?;
                uow.save_rfq(rfq)?;
            }

            if let Some(product_id) = terms.product_id {
                let product = uow
                    .product(product_id)
                    .ok_or_else(|| ServiceError::not_found(format!("product {product_id}")))?;
                if product.seller_id() != terms.seller_id {
                    return Err(ServiceError::validation("product does not belong to the seller"));
                }
                if !product.is_active() {
                    return Err(ServiceError::conflict("product listing is inactive"));
                }
            }

            let transaction = Transaction::price(TransactionId::new(), principal.user_id, terms.clone(), now)?;
            let sequence = uow.next_invoice_sequence();
            let invoice = Invoice::issue(InvoiceId::new(), &transaction, sequence, now)?;
            uow.save_transaction(transaction.clone())?;
            uow.insert_invoice(invoice.clone())?;
            Ok(TransactionReceipt { transaction, invoice })
        })?;

        tracing::info!(
            transaction = %receipt.transaction.id_typed(),
            invoice = %receipt.invoice.number(),
            total = %receipt.transaction.total_amount(),
            commission = %receipt.transaction.commission_amount(),
            "transaction created"
        );
        Ok(receipt)
    }

    pub fn transaction(&self, principal: &Principal, id: TransactionId) -> ServiceResult<TransactionReceipt> {
        let (transaction, invoice) = self
            .store
            .read(|uow| (uow.find_transaction(id), uow.invoice_for(id)))?;
        let transaction = transaction.ok_or_else(|| ServiceError::not_found(format!("transaction {id}")))?;
        if !(principal.role.is_admin() || transaction.is_party(principal.user_id)) {
            return Err(ServiceError::forbidden("not a party to this transaction"));
        }
        let invoice = invoice.ok_or(ServiceError::Internal)?;
        Ok(TransactionReceipt { transaction, invoice })
    }

    pub fn complete_transaction(&self, principal: &Principal, id: TransactionId) -> ServiceResult<Transaction> {
        self.settle(principal, id, true)
    }

    pub fn fail_transaction(&self, principal: &Principal, id: TransactionId) -> ServiceResult<Transaction> {
        self.settle(principal, id, false)
    }

    #[tracing::instrument(skip(self), fields(actor = %principal.user_id))]
    fn settle(&self, principal: &Principal, id: TransactionId, completed: bool) -> ServiceResult<Transaction> {
        let now = self.clock.now();
        let transaction = self.store.transaction(|uow| {
            let mut transaction = uow
                .find_transaction(id)
                .ok_or_else(|| ServiceError::not_found(format!("transaction {id}")))?;
            let is_admin = principal.role.is_admin();
            if !(is_admin || transaction.is_party(principal.user_id)) {
                return Err(ServiceError::forbidden("not a party to this transaction"));
            }
            if completed {
                transaction.complete(now)?;
            } else {
                transaction.fail(now)?;
            }
            uow.save_transaction(transaction.clone())?;
            if is_admin && !transaction.is_party(principal.user_id) {
                audit::record_in(
                    uow,
                    AuditActor::Admin(principal.user_id),
                    AdminAction::SettleTransaction,
                    Some(transaction.seller_id()),
                    format!("transaction={id} status={:?}", transaction.status()),
                    now,
                )?;
            }
            Ok(transaction)
        })?;
        tracing::info!(transaction = %id, status = ?transaction.status(), "transaction settled");
        Ok(transaction)
    }

    /// Administrative OPEN/APPROVED -> CLOSED.
    #[tracing::instrument(skip(self), fields(admin = %principal.user_id))]
    pub fn close_rfq(&self, principal: &Principal, rfq_id: RfqId) -> ServiceResult<Rfq> {
        principal.require_admin()?;
        let now = self.clock.now();
        self.store.transaction(|uow| {
            let mut rfq = load_rfq(uow, rfq_id)?;
            rfq.close(now)?;
            uow.save_rfq(rfq.clone())?;
            audit::record_in(
                uow,
                AuditActor::Admin(principal.user_id),
                AdminAction::CloseRfq,
                Some(rfq.buyer_id()),
                format!("rfq={rfq_id} title={}", rfq.title()),
                now,
            )?;
            Ok(rfq)
        })
    }
}
