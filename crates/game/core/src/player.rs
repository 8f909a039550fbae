//! Seat identifiers used by proposals, move records, and sanitization.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Index of a seat in a game, or one of the reserved sentinels.
///
/// Non-negative values name a seat. Negative values are reserved:
/// [`PlayerIndex::OBSERVER`] for a viewer with no seat and
/// [`PlayerIndex::ADMIN`] for moves the engine proposes on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerIndex(pub i32);

impl PlayerIndex {
    /// A viewer that does not occupy any seat.
    pub const OBSERVER: Self = Self(-1);

    /// The engine itself. Fix-up, seat, and timer moves carry this proposer.
    pub const ADMIN: Self = Self(-2);

    /// Creates the index for seat `seat`.
    pub const fn seat(seat: usize) -> Self {
        Self(seat as i32)
    }

    /// Returns true for [`PlayerIndex::ADMIN`].
    pub const fn is_admin(self) -> bool {
        self.0 == Self::ADMIN.0
    }

    /// Returns true for [`PlayerIndex::OBSERVER`].
    pub const fn is_observer(self) -> bool {
        self.0 == Self::OBSERVER.0
    }

    /// Returns true when this index names a real seat.
    pub const fn is_player(self) -> bool {
        self.0 >= 0
    }

    /// Seat position as a `usize`, if this is a real seat.
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    /// Returns true if this index names a seat that exists in a game of
    /// `num_players` seats.
    pub fn is_valid_seat(self, num_players: usize) -> bool {
        self.index().is_some_and(|i| i < num_players)
    }

    /// The seat after this one, wrapping around `num_players`.
    ///
    /// Sentinels wrap to seat 0.
    pub fn next(self, num_players: usize) -> Self {
        match self.index() {
            Some(i) if num_players > 0 => Self::seat((i + 1) % num_players),
            _ => Self::seat(0),
        }
    }
}

impl fmt::Display for PlayerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ADMIN => write!(f, "admin"),
            Self::OBSERVER => write!(f, "observer"),
            Self(seat) => write!(f, "player {}", seat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_not_players() {
        assert!(PlayerIndex::ADMIN.is_admin());
        assert!(!PlayerIndex::ADMIN.is_player());
        assert!(PlayerIndex::OBSERVER.is_observer());
        assert_eq!(PlayerIndex::ADMIN.index(), None);
        assert_eq!(PlayerIndex::seat(3).index(), Some(3));
    }

    #[test]
    fn test_next_wraps() {
        assert_eq!(PlayerIndex::seat(0).next(2), PlayerIndex::seat(1));
        assert_eq!(PlayerIndex::seat(1).next(2), PlayerIndex::seat(0));
        assert_eq!(PlayerIndex::ADMIN.next(2), PlayerIndex::seat(0));
    }

    #[test]
    fn test_serializes_as_plain_integer() {
        let json = serde_json::to_string(&PlayerIndex::ADMIN).unwrap();
        assert_eq!(json, "-2");
        let seat: PlayerIndex = serde_json::from_str("1").unwrap();
        assert_eq!(seat, PlayerIndex::seat(1));
    }
}
