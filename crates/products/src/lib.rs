//! Products domain module.
//!
//! Seller listings and the deterministic rule for which listings stay active
//! when a seller is over quota. Pure domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{NewListing, Product, listings_over_quota};
