//! In-memory GameRepository implementation for tests and local runs.

use std::collections::HashMap;
use std::sync::RwLock;

use game_core::{GameId, GameRecord, MoveRecord, StateSnapshot};
use serde_json::Value;

use crate::repository::traits::validate_append;
use crate::repository::{GameRepository, Mailbox, RepositoryError, Result};

struct StoredGame {
    record: GameRecord,
    /// State blobs indexed by version.
    states: Vec<Value>,
    /// Moves indexed by `version - 1`.
    moves: Vec<MoveRecord>,
}

/// In-memory implementation of GameRepository.
///
/// Every save happens under one write lock, so readers never observe a
/// version without its state and move.
pub struct InMemoryGameRepo {
    games: RwLock<HashMap<GameId, StoredGame>>,
    mailbox: Mailbox,
}

impl InMemoryGameRepo {
    /// Create a new empty in-memory repository.
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            mailbox: Mailbox::new(),
        }
    }

    /// Create a repository sharing an existing mailbox.
    pub fn with_mailbox(mailbox: Mailbox) -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            mailbox,
        }
    }
}

impl Default for InMemoryGameRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl GameRepository for InMemoryGameRepo {
    fn game(&self, id: &GameId) -> Result<GameRecord> {
        let games = self
            .games
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        games
            .get(id)
            .map(|g| g.record.clone())
            .ok_or_else(|| RepositoryError::GameNotFound(id.clone()))
    }

    fn state(&self, id: &GameId, version: u64) -> Result<StateSnapshot> {
        let games = self
            .games
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let game = games
            .get(id)
            .ok_or_else(|| RepositoryError::GameNotFound(id.clone()))?;
        usize::try_from(version)
            .ok()
            .and_then(|v| game.states.get(v))
            .map(|blob| StateSnapshot::new(id.clone(), version, blob.clone()))
            .ok_or_else(|| RepositoryError::VersionNotFound {
                game_id: id.clone(),
                version,
            })
    }

    fn move_record(&self, id: &GameId, version: u64) -> Result<MoveRecord> {
        let games = self
            .games
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let game = games
            .get(id)
            .ok_or_else(|| RepositoryError::GameNotFound(id.clone()))?;
        version
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| game.moves.get(i))
            .cloned()
            .ok_or_else(|| RepositoryError::VersionNotFound {
                game_id: id.clone(),
                version,
            })
    }

    fn moves(&self, id: &GameId, up_to: u64) -> Result<Vec<MoveRecord>> {
        let games = self
            .games
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let game = games
            .get(id)
            .ok_or_else(|| RepositoryError::GameNotFound(id.clone()))?;
        if up_to > game.moves.len() as u64 {
            return Err(RepositoryError::VersionNotFound {
                game_id: id.clone(),
                version: up_to,
            });
        }
        Ok(game.moves[..up_to as usize].to_vec())
    }

    fn save_game_and_current_state(
        &self,
        game: &GameRecord,
        state: &StateSnapshot,
        mv: Option<&MoveRecord>,
    ) -> Result<()> {
        let mut games = self
            .games
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        validate_append(games.get(&game.id).map(|g| &g.record), game, state, mv)?;

        match (games.get_mut(&game.id), mv) {
            (Some(stored), Some(mv)) => {
                stored.record = game.clone();
                stored.states.push(state.blob.clone());
                stored.moves.push(mv.clone());
            }
            _ => {
                games.insert(
                    game.id.clone(),
                    StoredGame {
                        record: game.clone(),
                        states: vec![state.blob.clone()],
                        moves: Vec::new(),
                    },
                );
            }
        }

        tracing::trace!(
            target: "runtime::repository",
            game_id = %game.id,
            version = game.version,
            "saved version"
        );
        Ok(())
    }

    fn list_games(&self) -> Result<Vec<GameId>> {
        let games = self
            .games
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let mut ids: Vec<GameId> = games.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use game_core::{PlayerIndex, Variant};
    use serde_json::json;

    fn record(version: u64) -> GameRecord {
        GameRecord {
            name: "pig".into(),
            id: GameId::new("mem"),
            secret_salt: String::new(),
            version,
            winners: vec![],
            finished: false,
            num_players: 2,
            agents: vec![],
            variant: Variant::new(),
            created: Utc::now(),
            modified: Utc::now(),
        }
    }

    fn mv(version: u64) -> MoveRecord {
        MoveRecord {
            name: "Roll".into(),
            version,
            initiator: version,
            phase: 0,
            proposer: PlayerIndex::seat(0),
            timestamp: Utc::now(),
            blob: json!({}),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let repo = InMemoryGameRepo::new();
        let id = GameId::new("mem");
        repo.save_game_and_current_state(&record(0), &StateSnapshot::new(id.clone(), 0, json!({})), None)
            .unwrap();
        repo.save_game_and_current_state(
            &record(1),
            &StateSnapshot::new(id.clone(), 1, json!({ "N": 1 })),
            Some(&mv(1)),
        )
        .unwrap();

        assert_eq!(repo.game(&id).unwrap().version, 1);
        assert_eq!(repo.state(&id, 1).unwrap().blob, json!({ "N": 1 }));
        assert_eq!(repo.moves(&id, 1).unwrap().len(), 1);
        assert!(repo.move_record(&id, 0).unwrap_err().is_not_found());
        assert!(repo.state(&id, 2).unwrap_err().is_not_found());
    }

    #[test]
    fn test_rejects_gaps_and_duplicates() {
        let repo = InMemoryGameRepo::new();
        let id = GameId::new("mem");
        let snapshot = |v| StateSnapshot::new(id.clone(), v, json!({}));
        repo.save_game_and_current_state(&record(0), &snapshot(0), None)
            .unwrap();

        let err = repo
            .save_game_and_current_state(&record(0), &snapshot(0), None)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::GameAlreadyExists(_)));

        let err = repo
            .save_game_and_current_state(&record(2), &snapshot(2), Some(&mv(2)))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::VersionConflict { expected: 1, .. }));
        assert_eq!(repo.game(&id).unwrap().version, 0);
    }
}
