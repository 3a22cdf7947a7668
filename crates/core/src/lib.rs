//! `bazaar-core` — marketplace domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod version;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    AdminLogId, InvoiceId, MessageId, PlanId, ProductId, RfqId, SubscriptionId, TransactionId,
    UserId,
};
pub use money::Money;
pub use version::ExpectedVersion;
