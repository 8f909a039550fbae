//! Event types for different topics.

use game_core::{GameId, PlayerIndex};
use serde::{Deserialize, Serialize};

/// Lifecycle and version notifications for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Version 0 of a new game was persisted.
    Created { game_id: GameId, name: String },

    /// A move committed and the game now stands at `version`.
    VersionChanged { game_id: GameId, version: u64 },

    /// The game finished; no further moves will be accepted.
    Finished {
        game_id: GameId,
        version: u64,
        winners: Vec<PlayerIndex>,
    },

    /// The rule set misbehaved and the game stopped accepting moves.
    Unhealthy { game_id: GameId, reason: String },
}

/// Outcomes of proposals that did not produce a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalEvent {
    Rejected {
        game_id: GameId,
        name: String,
        proposer: PlayerIndex,
        reason: String,
    },
}
