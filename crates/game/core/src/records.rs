//! Persisted value objects: game metadata, applied moves, and state snapshots.
//!
//! These are the only shapes that cross the storage boundary. They are plain
//! data; invariants between them are upheld by the runtime's move pipeline.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::player::PlayerIndex;
use crate::variant::Variant;

/// Opaque, unique identifier of a game.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identity, immutable metadata, and the mutable head pointer of one game.
///
/// Once `finished` is true, `version` and `winners` never change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameRecord {
    /// Rule set this game belongs to; must equal the delegate's name.
    pub name: String,
    pub id: GameId,
    /// Hex-encoded salt used for PRNG seeding and salted hashing of hidden
    /// component identities.
    #[serde(default)]
    pub secret_salt: String,
    /// Number of states after the initial one (0 = freshly set up).
    pub version: u64,
    #[serde(default)]
    pub winners: Vec<PlayerIndex>,
    #[serde(default)]
    pub finished: bool,
    pub num_players: usize,
    /// Optional agent name per seat.
    #[serde(default)]
    pub agents: Vec<Option<String>>,
    #[serde(default)]
    pub variant: Variant,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl GameRecord {
    /// Salt bytes. Falls back to the raw string bytes when the stored salt is
    /// not valid hex (hand-edited records).
    pub fn salt_bytes(&self) -> Vec<u8> {
        hex::decode(&self.secret_salt).unwrap_or_else(|_| self.secret_salt.as_bytes().to_vec())
    }
}

/// One applied move.
///
/// `initiator` is the version of the first move in the causal chain this move
/// belongs to. A move with `initiator == version` started its own chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoveRecord {
    pub name: String,
    /// Version this move produced (moves start at version 1).
    pub version: u64,
    pub initiator: u64,
    pub phase: i64,
    pub proposer: PlayerIndex,
    pub timestamp: DateTime<Utc>,
    /// Move-type-specific parameters.
    #[serde(default)]
    pub blob: Value,
}

impl MoveRecord {
    /// True when this move started its own causal chain (player, seat, or
    /// timer move).
    pub fn is_initiator(&self) -> bool {
        self.initiator == self.version
    }

    /// Distance back to the initiator (0 for initiators).
    pub fn initiator_offset(&self) -> u64 {
        self.version.saturating_sub(self.initiator)
    }
}

/// The full serialized state of a game at one version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateSnapshot {
    pub game_id: GameId,
    pub version: u64,
    pub blob: Value,
}

impl StateSnapshot {
    pub fn new(game_id: GameId, version: u64, blob: Value) -> Self {
        Self {
            game_id,
            version,
            blob,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_move_record_uses_pascal_case() {
        let record = MoveRecord {
            name: "Roll".into(),
            version: 3,
            initiator: 2,
            phase: 1,
            proposer: PlayerIndex::ADMIN,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            blob: json!({}),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["Name"], "Roll");
        assert_eq!(value["Proposer"], -2);
        assert!(!record.is_initiator());
        assert_eq!(record.initiator_offset(), 1);
    }

    #[test]
    fn test_salt_bytes_falls_back_to_raw() {
        let mut record = GameRecord {
            name: "pig".into(),
            id: GameId::new("abc"),
            secret_salt: "00ff".into(),
            version: 0,
            winners: vec![],
            finished: false,
            num_players: 2,
            agents: vec![],
            variant: Variant::new(),
            created: Utc::now(),
            modified: Utc::now(),
        };
        assert_eq!(record.salt_bytes(), vec![0x00, 0xff]);
        record.secret_salt = "not hex".into();
        assert_eq!(record.salt_bytes(), b"not hex".to_vec());
    }
}
