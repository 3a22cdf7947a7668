//! RFQ negotiation messages.
//!
//! The log is append-only. Routing is derived from the RFQ: sellers always
//! write to the buyer, and the buyer always writes to the first seller who
//! responded (`Rfq::counterparty_seller_id`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_auth::Principal;
use bazaar_core::{DomainError, DomainResult, Entity, MessageId, RfqId, UserId};

use crate::rfq::{Rfq, RfqStatus};

const MAX_BODY_CHARS: usize = 4_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    id: MessageId,
    rfq_id: RfqId,
    sender_id: UserId,
    receiver_id: UserId,
    body: String,
    sent_at: DateTime<Utc>,
    is_read: bool,
}

impl ChatMessage {
    pub fn id_typed(&self) -> MessageId {
        self.id
    }

    pub fn rfq_id(&self) -> RfqId {
        self.rfq_id
    }

    pub fn sender_id(&self) -> UserId {
        self.sender_id
    }

    pub fn receiver_id(&self) -> UserId {
        self.receiver_id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    pub fn is_read(&self) -> bool {
        self.is_read
    }

    /// Only the receiver can mark a message read; marking twice is a no-op.
    pub fn mark_read(&mut self, reader: UserId) -> DomainResult<()> {
        if reader != self.receiver_id {
            return Err(DomainError::unauthorized("only the receiver can mark a message read"));
        }
        self.is_read = true;
        Ok(())
    }
}

impl Entity for ChatMessage {
    type Id = MessageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Build the next message on `rfq` from `sender`, updating the RFQ's counterparty
/// when a seller responds for the first time.
pub fn route_message(
    rfq: &mut Rfq,
    sender: &Principal,
    body: &str,
    now: DateTime<Utc>,
) -> DomainResult<ChatMessage> {
    let body = body.trim();
    if body.is_empty() {
        return Err(DomainError::validation("message body cannot be empty"));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(DomainError::validation(format!(
            "message body exceeds {MAX_BODY_CHARS} characters"
        )));
    }
    if rfq.status() == RfqStatus::Closed {
        return Err(DomainError::conflict("rfq is closed"));
    }

    let receiver_id = if sender.user_id == rfq.buyer_id() {
        rfq.counterparty_seller_id().ok_or_else(|| {
            DomainError::validation("no seller has responded to this RFQ yet")
        })?
    } else {
        if !sender.role.can_sell() {
            return Err(DomainError::unauthorized("only sellers can respond to an RFQ"));
        }
        rfq.record_responder(sender.user_id, now);
        rfq.buyer_id()
    };

    Ok(ChatMessage {
        id: MessageId::new(),
        rfq_id: rfq.id_typed(),
        sender_id: sender.user_id,
        receiver_id,
        body: body.to_string(),
        sent_at: now,
        is_read: false,
    })
}
