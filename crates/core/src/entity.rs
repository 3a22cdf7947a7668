//! Row identity for stored marketplace records.

/// A record whose identity survives state changes.
///
/// Users, subscriptions, listings, RFQs and transactions are all entities: two
/// records with the same identifier are the same row, whatever their fields say.
pub trait Entity {
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    fn id(&self) -> &Self::Id;

    /// Whether `other` is a later (or earlier) state of the same row.
    fn same_row(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
