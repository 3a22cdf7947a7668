//! Accounts domain module.
//!
//! Marketplace users with their approval state machine, and the append-only
//! administrator audit trail.

pub mod admin_log;
pub mod user;

pub use admin_log::{AdminAction, AdminLog, AuditActor};
pub use user::{AccountSnapshot, ApprovalState, NewUser, User, normalize_email};
