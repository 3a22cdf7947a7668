//! Transactional persistence boundary.
//!
//! The engine only ever talks to [`Store`]; every state-changing operation is a
//! single unit of work run through [`Store::transaction`].

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use r#trait::{PurgeReport, Store, StoreError, UnitOfWork};
