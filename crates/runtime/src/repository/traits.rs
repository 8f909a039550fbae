//! Repository contract for game records, states, and moves.

use game_core::{GameId, GameRecord, MoveRecord, StateSnapshot};

use super::error::{RepositoryError, Result};
use super::injected::{InjectedData, Mailbox};

/// Append-only store of `(game, state, move)` triples.
///
/// Implementations are shared across every game and handle their own
/// locking. A save is all-or-nothing: readers either see the previous
/// version or the new game record together with its state and move.
pub trait GameRepository: Send + Sync {
    fn game(&self, id: &GameId) -> Result<GameRecord>;

    fn state(&self, id: &GameId, version: u64) -> Result<StateSnapshot>;

    /// Move that produced `version` (moves start at version 1).
    fn move_record(&self, id: &GameId, version: u64) -> Result<MoveRecord>;

    /// Moves `1..=up_to`.
    fn moves(&self, id: &GameId, up_to: u64) -> Result<Vec<MoveRecord>> {
        (1..=up_to).map(|v| self.move_record(id, v)).collect()
    }

    /// Persists a new version.
    ///
    /// Without a move this creates version 0 of a new game. With a move,
    /// `game.version` must be exactly one past the stored version and match
    /// both `state.version` and `mv.version`.
    fn save_game_and_current_state(
        &self,
        game: &GameRecord,
        state: &StateSnapshot,
        mv: Option<&MoveRecord>,
    ) -> Result<()>;

    fn list_games(&self) -> Result<Vec<GameId>>;

    /// Side channel for engine-external signals.
    fn mailbox(&self) -> &Mailbox;

    fn fetch_injected_data_for_game(&self, id: &GameId, tag: &str) -> Option<InjectedData> {
        self.mailbox().fetch(id, tag)
    }
}

/// Checks that a save continues the stored history.
pub(crate) fn validate_append(
    existing: Option<&GameRecord>,
    game: &GameRecord,
    state: &StateSnapshot,
    mv: Option<&MoveRecord>,
) -> Result<()> {
    let conflict = |expected: u64, found: u64| RepositoryError::VersionConflict {
        game_id: game.id.clone(),
        expected,
        found,
    };

    match (existing, mv) {
        (Some(_), None) => Err(RepositoryError::GameAlreadyExists(game.id.clone())),
        (None, None) => {
            if game.version != 0 {
                return Err(conflict(0, game.version));
            }
            if state.version != 0 {
                return Err(conflict(0, state.version));
            }
            Ok(())
        }
        (None, Some(_)) => Err(RepositoryError::GameNotFound(game.id.clone())),
        (Some(current), Some(mv)) => {
            if current.finished {
                return Err(RepositoryError::CorruptedData(format!(
                    "game {} is finished and cannot advance",
                    game.id
                )));
            }
            let expected = current.version + 1;
            for found in [game.version, state.version, mv.version] {
                if found != expected {
                    return Err(conflict(expected, found));
                }
            }
            Ok(())
        }
    }
}
