//! Participant identities and normalized pairs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable numeric identity of a chat participant.
///
/// User ids appear in broker destinations (`/user/{id}/...`) and in the
/// room-lookup URL, so they are numeric rather than free-form strings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    /// Create a user id from its raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Unordered pair of participants, normalized at construction.
///
/// `(a, b)` and `(b, a)` produce the same pair, so a pair is usable as a
/// cache key for per-conversation state such as resolved room names.
///
/// # Invariants
///
/// - `lo() <= hi()` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantPair {
    lo: UserId,
    hi: UserId,
}

impl ParticipantPair {
    /// Create a normalized pair from two participants in any order.
    #[must_use]
    pub fn new(a: UserId, b: UserId) -> Self {
        if a <= b { Self { lo: a, hi: b } } else { Self { lo: b, hi: a } }
    }

    /// Smaller participant id of the pair.
    #[must_use]
    pub const fn lo(self) -> UserId {
        self.lo
    }

    /// Larger participant id of the pair.
    #[must_use]
    pub const fn hi(self) -> UserId {
        self.hi
    }
}

impl fmt::Display for ParticipantPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lo, self.hi)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::proptest;

    use super::*;

    #[test]
    fn pair_is_order_insensitive() {
        let a = UserId::new(7);
        let b = UserId::new(3);

        assert_eq!(ParticipantPair::new(a, b), ParticipantPair::new(b, a));
        assert_eq!(ParticipantPair::new(a, b).lo(), b);
        assert_eq!(ParticipantPair::new(a, b).hi(), a);
    }

    #[test]
    fn pair_of_identical_participants() {
        let a = UserId::new(5);
        let pair = ParticipantPair::new(a, a);

        assert_eq!(pair.lo(), a);
        assert_eq!(pair.hi(), a);
    }

    proptest! {
        #[test]
        fn pair_normalization_is_commutative(a: u64, b: u64) {
            let forward = ParticipantPair::new(UserId::new(a), UserId::new(b));
            let reverse = ParticipantPair::new(UserId::new(b), UserId::new(a));

            assert_eq!(forward, reverse);
            assert!(forward.lo() <= forward.hi());
        }
    }
}
