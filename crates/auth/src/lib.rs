//! `bazaar-auth` — roles, principals and the identity boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: credential
//! verification is a collaborator (`Identity`) that the engine consumes.

pub mod error;
pub mod identity;
pub mod password;
pub mod principal;
pub mod roles;

pub use error::AuthError;
pub use identity::{Credentials, Identity};
pub use principal::Principal;
pub use roles::Role;
