//! Invoices and the invoice-number scheme.
//!
//! Format: `INV-{yyyymmdd}-{sequence:06}-{tx8}` where `sequence` comes from the
//! store's monotonic counter and `tx8` is the first 8 hex digits of the
//! transaction id. The sequence alone is unique; the transaction suffix keeps
//! numbers distinct even across independently seeded stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{DomainError, DomainResult, Entity, InvoiceId, Money, TransactionId};

use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    pub fn compose(issued_at: DateTime<Utc>, sequence: u64, transaction_id: TransactionId) -> Self {
        let simple = transaction_id.as_uuid().simple().to_string();
        Self(format!(
            "INV-{}-{:06}-{}",
            issued_at.format("%Y%m%d"),
            sequence,
            &simple[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One-to-one with a [`Transaction`]; never changes after issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    transaction_id: TransactionId,
    number: InvoiceNumber,
    amount: Money,
    issued_at: DateTime<Utc>,
}

impl Invoice {
    pub fn issue(
        id: InvoiceId,
        transaction: &Transaction,
        sequence: u64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if sequence == 0 {
            return Err(DomainError::invariant("invoice sequence starts at 1"));
        }
        Ok(Self {
            id,
            transaction_id: transaction.id_typed(),
            number: InvoiceNumber::compose(now, sequence, transaction.id_typed()),
            amount: transaction.total_amount(),
            issued_at: now,
        })
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn number(&self) -> &InvoiceNumber {
        &self.number
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
