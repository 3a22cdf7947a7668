use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{DomainError, DomainResult, Entity, Money, RfqId, UserId};

/// RFQ status lifecycle.
///
/// OPEN -> APPROVED happens when a transaction references the RFQ.
/// CLOSED is only reached through an explicit administrative action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RfqStatus {
    Open,
    Approved,
    Closed,
}

/// Buyer-supplied RFQ fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRfq {
    pub title: String,
    pub description: String,
    pub category: String,
    pub quantity: u32,
    pub unit: String,
    pub budget: Option<Money>,
    pub deadline: Option<DateTime<Utc>>,
}

/// Request for Quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rfq {
    id: RfqId,
    buyer_id: UserId,
    title: String,
    description: String,
    category: String,
    quantity: u32,
    unit: String,
    budget: Option<Money>,
    deadline: Option<DateTime<Utc>>,
    status: RfqStatus,
    /// First seller to message on this RFQ; the buyer's replies go to them.
    counterparty_seller_id: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Rfq {
    pub fn open(id: RfqId, buyer_id: UserId, new: NewRfq, now: DateTime<Utc>) -> DomainResult<Self> {
        for (field, value) in [
            ("title", &new.title),
            ("description", &new.description),
            ("category", &new.category),
            ("unit", &new.unit),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{field} is required")));
            }
        }
        if new.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if let Some(deadline) = new.deadline {
            if deadline <= now {
                return Err(DomainError::validation("deadline must be in the future"));
            }
        }

        Ok(Self {
            id,
            buyer_id,
            title: new.title.trim().to_string(),
            description: new.description.trim().to_string(),
            category: new.category.trim().to_string(),
            quantity: new.quantity,
            unit: new.unit.trim().to_string(),
            budget: new.budget,
            deadline: new.deadline,
            status: RfqStatus::Open,
            counterparty_seller_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id_typed(&self) -> RfqId {
        self.id
    }

    pub fn buyer_id(&self) -> UserId {
        self.buyer_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn budget(&self) -> Option<Money> {
        self.budget
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn status(&self) -> RfqStatus {
        self.status
    }

    pub fn counterparty_seller_id(&self) -> Option<UserId> {
        self.counterparty_seller_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_participant(&self, user: UserId) -> bool {
        self.buyer_id == user || self.counterparty_seller_id == Some(user)
    }

    /// Record a seller response. Only the first responder sticks.
    ///
    /// Returns `true` when this call made `seller` the counterparty.
    pub fn record_responder(&mut self, seller: UserId, now: DateTime<Utc>) -> bool {
        if self.counterparty_seller_id.is_some() || seller == self.buyer_id {
            return false;
        }
        self.counterparty_seller_id = Some(seller);
        self.updated_at = now;
        true
    }

    /// OPEN -> APPROVED, triggered by transaction creation.
    pub fn approve(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != RfqStatus::Open {
            return Err(DomainError::conflict(format!(
                "rfq {} is {:?}; only open RFQs can be turned into a transaction",
                self.id, self.status
            )));
        }
        self.status = RfqStatus::Approved;
        self.updated_at = now;
        Ok(())
    }

    /// Administrative close from OPEN or APPROVED.
    pub fn close(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == RfqStatus::Closed {
            return Err(DomainError::conflict("rfq is already closed"));
        }
        self.status = RfqStatus::Closed;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Rfq {
    type Id = RfqId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_rfq() -> NewRfq {
        NewRfq {
            title: "500 tonnes basmati rice".to_string(),
            description: "Aged 1121, export grade".to_string(),
            category: "Agriculture".to_string(),
            quantity: 500,
            unit: "tonne".to_string(),
            budget: Some(Money::from_major(40_000_000)),
            deadline: None,
        }
    }

    #[test]
    fn opens_with_open_status_and_no_counterparty() {
        let rfq = Rfq::open(RfqId::new(), UserId::new(), new_rfq(), Utc::now()).unwrap();
        assert_eq!(rfq.status(), RfqStatus::Open);
        assert!(rfq.counterparty_seller_id().is_none());
    }

    #[test]
    fn mandatory_fields() {
        let mut input = new_rfq();
        input.category = " ".into();
        let err = Rfq::open(RfqId::new(), UserId::new(), input, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("category is required"));

        let mut input = new_rfq();
        input.quantity = 0;
        assert!(Rfq::open(RfqId::new(), UserId::new(), input, Utc::now()).is_err());
    }

    #[test]
    fn past_deadline_is_rejected() {
        let mut input = new_rfq();
        let now = Utc::now();
        input.deadline = Some(now - Duration::days(1));
        assert!(Rfq::open(RfqId::new(), UserId::new(), input, now).is_err());
    }

    #[test]
    fn first_responder_sticks() {
        let mut rfq = Rfq::open(RfqId::new(), UserId::new(), new_rfq(), Utc::now()).unwrap();
        let first = UserId::new();
        let second = UserId::new();
        assert!(rfq.record_responder(first, Utc::now()));
        assert!(!rfq.record_responder(second, Utc::now()));
        assert_eq!(rfq.counterparty_seller_id(), Some(first));
        assert!(rfq.is_participant(first));
        assert!(!rfq.is_participant(second));
    }

    #[test]
    fn approve_only_from_open() {
        let mut rfq = Rfq::open(RfqId::new(), UserId::new(), new_rfq(), Utc::now()).unwrap();
        rfq.approve(Utc::now()).unwrap();
        assert_eq!(rfq.status(), RfqStatus::Approved);
        assert!(matches!(rfq.approve(Utc::now()), Err(DomainError::Conflict(_))));
        rfq.close(Utc::now()).unwrap();
        assert_eq!(rfq.status(), RfqStatus::Closed);
        assert!(rfq.close(Utc::now()).is_err());
    }
}
