//! Track identifiers
//!
//! IDs are assigned monotonically by an [`IdGenerator`] and never reused
//! within one generator.

use serde::{Deserialize, Serialize};

/// A unique track identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl TrackId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for TrackId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out increasing [`TrackId`]s.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    /// Creates a generator whose first ID is 0.
    #[inline]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Creates a generator whose first ID is `first`.
    #[inline]
    pub const fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    #[inline]
    pub fn next_id(&mut self) -> TrackId {
        let id = TrackId(self.next);
        self.next += 1;
        id
    }

    /// Makes sure future IDs are strictly greater than `seen`.
    pub fn observe(&mut self, seen: TrackId) {
        self.next = self.next.max(seen.0 + 1);
    }

    /// ID the next call to [`next_id`](Self::next_id) will return.
    #[inline]
    pub fn peek(&self) -> TrackId {
        TrackId(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut ids = IdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(b > a);
        assert_eq!(b, TrackId(1));
    }

    #[test]
    fn test_observe_skips_past_decoded_ids() {
        let mut ids = IdGenerator::starting_at(3);
        ids.observe(TrackId(10));
        assert_eq!(ids.next_id(), TrackId(11));
        ids.observe(TrackId(2));
        assert_eq!(ids.peek(), TrackId(12));
    }
}
