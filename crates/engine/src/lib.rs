//! `bazaar-engine` — marketplace lifecycle services.
//!
//! Wires the pure domain crates to a [`bazaar_infra::Store`]: every mutating
//! operation is one atomic unit of work, notifications go out after commit.

pub mod approval;
pub mod audit;
mod blocking;
pub mod catalog;
pub mod deals;
pub mod error;
pub mod marketplace;
pub mod quota;
pub mod subscriptions;
pub mod sweeper;

pub use approval::{ApprovalOutcome, ApprovalWorkflow, RejectionOutcome};
pub use audit::AdminAudit;
pub use catalog::PlanCatalog;
pub use deals::{DealPipeline, TransactionReceipt};
pub use error::{ServiceError, ServiceResult};
pub use marketplace::{LoginOutcome, Marketplace, SignupOutcome, SignupRequest};
pub use quota::ListingQuotaEnforcer;
pub use subscriptions::{ExpiredSubscription, SubscriptionChange, SubscriptionLifecycle, SweepFailure, SweepReport};
pub use sweeper::{SweeperHandle, spawn_sweeper};
