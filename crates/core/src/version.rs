//! Revision expectations for optimistic commits.

/// The store revision a writer read before doing its work.
///
/// A commit made with this expectation goes through only if nothing was
/// written since.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(pub u64);

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_an_unchanged_revision() {
        assert!(ExpectedVersion(4).matches(4));
        assert!(!ExpectedVersion(4).matches(5));
        assert!(!ExpectedVersion(4).matches(3));
    }
}
