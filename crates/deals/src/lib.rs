//! Deals domain module.
//!
//! The RFQ -> negotiation -> transaction -> invoice pipeline, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod chat;
pub mod invoice;
pub mod rfq;
pub mod transaction;

pub use chat::{ChatMessage, route_message};
pub use invoice::{Invoice, InvoiceNumber};
pub use rfq::{NewRfq, Rfq, RfqStatus};
pub use transaction::{DealTerms, Transaction, TransactionStatus};
