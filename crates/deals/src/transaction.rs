use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_billing::derive_total_from_net;
use bazaar_core::{DomainError, DomainResult, Entity, Money, ProductId, RfqId, TransactionId, UserId};

/// Settlement state. PENDING is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Agreed deal terms the buyer submits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealTerms {
    pub rfq_id: Option<RfqId>,
    pub product_id: Option<ProductId>,
    pub seller_id: UserId,
    /// Price per unit in smallest currency unit.
    pub unit_price: Money,
    pub quantity: u32,
}

/// A priced deal between one buyer and one seller.
///
/// # Invariants
/// - `total_amount == product_amount + commission_amount`
/// - `product_amount == unit_price * quantity`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    rfq_id: Option<RfqId>,
    product_id: Option<ProductId>,
    buyer_id: UserId,
    seller_id: UserId,
    unit_price: Money,
    quantity: u32,
    product_amount: Money,
    commission_amount: Money,
    total_amount: Money,
    status: TransactionStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Price the deal. The commission is added on top of the product amount.
    pub fn price(
        id: TransactionId,
        buyer_id: UserId,
        terms: DealTerms,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if terms.seller_id == buyer_id {
            return Err(DomainError::validation("buyer and seller must differ"));
        }
        if terms.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if terms.unit_price.is_zero() {
            return Err(DomainError::validation("product price must be positive"));
        }

        let product_amount = terms.unit_price.checked_mul(u64::from(terms.quantity))?;
        let priced = derive_total_from_net(product_amount)?;

        Ok(Self {
            id,
            rfq_id: terms.rfq_id,
            product_id: terms.product_id,
            buyer_id,
            seller_id: terms.seller_id,
            unit_price: terms.unit_price,
            quantity: terms.quantity,
            product_amount: priced.product_amount,
            commission_amount: priced.commission,
            total_amount: priced.total,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn rfq_id(&self) -> Option<RfqId> {
        self.rfq_id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn buyer_id(&self) -> UserId {
        self.buyer_id
    }

    pub fn seller_id(&self) -> UserId {
        self.seller_id
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn product_amount(&self) -> Money {
        self.product_amount
    }

    pub fn commission_amount(&self) -> Money {
        self.commission_amount
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_party(&self, user: UserId) -> bool {
        self.buyer_id == user || self.seller_id == user
    }

    fn settle(&mut self, to: TransactionStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != TransactionStatus::Pending {
            return Err(DomainError::conflict(format!(
                "transaction {} is already {:?}",
                self.id, self.status
            )));
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.settle(TransactionStatus::Completed, now)
    }

    pub fn fail(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.settle(TransactionStatus::Failed, now)
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(unit_price: Money, quantity: u32) -> DealTerms {
        DealTerms {
            rfq_id: None,
            product_id: None,
            seller_id: UserId::new(),
            unit_price,
            quantity,
        }
    }

    #[test]
    fn small_deal_carries_flat_fee() {
        let tx = Transaction::price(
            TransactionId::new(),
            UserId::new(),
            terms(Money::from_major(1_000), 10),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(tx.product_amount(), Money::from_major(10_000));
        assert_eq!(tx.commission_amount(), Money::from_major(500));
        assert_eq!(tx.total_amount(), Money::from_major(10_500));
        assert_eq!(tx.status(), TransactionStatus::Pending);
    }

    #[test]
    fn large_deal_carries_percentage() {
        let tx = Transaction::price(
            TransactionId::new(),
            UserId::new(),
            terms(Money::from_major(25_000), 4),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(tx.product_amount(), Money::from_major(100_000));
        assert_eq!(tx.commission_amount(), Money::from_major(2_000));
        assert_eq!(tx.total_amount(), Money::from_major(102_000));
    }

    #[test]
    fn self_dealing_rejected() {
        let buyer = UserId::new();
        let mut t = terms(Money::from_major(10), 1);
        t.seller_id = buyer;
        assert!(matches!(
            Transaction::price(TransactionId::new(), buyer, t, Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn overflow_is_a_domain_error() {
        let err = Transaction::price(
            TransactionId::new(),
            UserId::new(),
            terms(Money::from_minor(u64::MAX / 2), 3),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn status_only_leaves_pending_once() {
        let mut tx = Transaction::price(
            TransactionId::new(),
            UserId::new(),
            terms(Money::from_major(10), 1),
            Utc::now(),
        )
        .unwrap();
        tx.complete(Utc::now()).unwrap();
        assert!(matches!(tx.fail(Utc::now()), Err(DomainError::Conflict(_))));
        assert_eq!(tx.status(), TransactionStatus::Completed);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: total always equals product amount plus commission.
            #[test]
            fn total_is_product_plus_commission(
                unit_minor in 1u64..10_000_000_000,
                quantity in 1u32..10_000
            ) {
                let tx = Transaction::price(
                    TransactionId::new(),
                    UserId::new(),
                    terms(Money::from_minor(unit_minor), quantity),
                    Utc::now(),
                ).unwrap();
                prop_assert_eq!(
                    tx.total_amount().minor(),
                    tx.product_amount().minor() + tx.commission_amount().minor()
                );
                prop_assert_eq!(tx.product_amount().minor(), unit_minor * quantity as u64);
            }
        }
    }
}
