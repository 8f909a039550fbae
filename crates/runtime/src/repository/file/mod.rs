//! File-based GameRepository implementation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use game_core::{GameId, GameRecord, MoveRecord, StateSnapshot};

use crate::codec::Codecs;
use crate::record::Record;
use crate::repository::traits::validate_append;
use crate::repository::{GameRepository, Mailbox, RepositoryError, Result};

const RECORD_EXTENSION: &str = "json";

/// File-based implementation of GameRepository.
///
/// # File Format
///
/// Each game is one `<GameId>.json` record file (see [`Record`]) so goldens
/// and live games share a format. Writes go to a temp file that is renamed
/// over the target, so a crash leaves either the old or the new version.
///
/// Loaded records are cached per instance; a successful overwrite replaces
/// the cached entry, and [`FileGameRepository::evict`] drops it explicitly.
pub struct FileGameRepository {
    base_dir: PathBuf,
    codecs: Codecs,
    cache: Mutex<HashMap<GameId, Record>>,
    mailbox: Mailbox,
}

impl FileGameRepository {
    /// Create a new file-based repository rooted at `base_dir`.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_codecs(base_dir, Codecs::default())
    }

    pub fn with_codecs(base_dir: impl AsRef<Path>, codecs: Codecs) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).map_err(RepositoryError::Io)?;
        Ok(Self {
            base_dir,
            codecs,
            cache: Mutex::new(HashMap::new()),
            mailbox: Mailbox::new(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the record file for `id`.
    pub fn record_path(&self, id: &GameId) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}", id.as_str(), RECORD_EXTENSION))
    }

    /// Drops the cached record of `id`; the next read goes to disk.
    pub fn evict(&self, id: &GameId) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(id);
        }
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, HashMap<GameId, Record>>> {
        self.cache.lock().map_err(|_| RepositoryError::LockPoisoned)
    }

    /// Loads `id` into `cache` if needed. Returns false when no file exists.
    fn ensure_loaded(&self, cache: &mut HashMap<GameId, Record>, id: &GameId) -> Result<bool> {
        if cache.contains_key(id) {
            return Ok(true);
        }
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(false);
        }
        let record = Record::load_with(&path, self.codecs.clone())?;
        tracing::debug!(
            target: "runtime::repository",
            game_id = %id,
            path = %path.display(),
            "loaded record"
        );
        cache.insert(id.clone(), record);
        Ok(true)
    }

    fn with_record<T>(&self, id: &GameId, f: impl FnOnce(&Record) -> Result<T>) -> Result<T> {
        let mut cache = self.lock_cache()?;
        if !self.ensure_loaded(&mut cache, id)? {
            return Err(RepositoryError::GameNotFound(id.clone()));
        }
        match cache.get(id) {
            Some(record) => f(record),
            None => Err(RepositoryError::GameNotFound(id.clone())),
        }
    }
}

impl GameRepository for FileGameRepository {
    fn game(&self, id: &GameId) -> Result<GameRecord> {
        self.with_record(id, |record| Ok(record.game().clone()))
    }

    fn state(&self, id: &GameId, version: u64) -> Result<StateSnapshot> {
        self.with_record(id, |record| {
            if version > record.game().version {
                return Err(RepositoryError::VersionNotFound {
                    game_id: id.clone(),
                    version,
                });
            }
            record
                .state(version)?
                .map(|blob| StateSnapshot::new(id.clone(), version, blob))
                .ok_or_else(|| RepositoryError::VersionNotFound {
                    game_id: id.clone(),
                    version,
                })
        })
    }

    fn move_record(&self, id: &GameId, version: u64) -> Result<MoveRecord> {
        self.with_record(id, |record| {
            record
                .move_record(version)
                .cloned()
                .ok_or_else(|| RepositoryError::VersionNotFound {
                    game_id: id.clone(),
                    version,
                })
        })
    }

    fn moves(&self, id: &GameId, up_to: u64) -> Result<Vec<MoveRecord>> {
        self.with_record(id, |record| {
            let moves = record.moves();
            if up_to > moves.len() as u64 {
                return Err(RepositoryError::VersionNotFound {
                    game_id: id.clone(),
                    version: up_to,
                });
            }
            Ok(moves[..up_to as usize].to_vec())
        })
    }

    fn save_game_and_current_state(
        &self,
        game: &GameRecord,
        state: &StateSnapshot,
        mv: Option<&MoveRecord>,
    ) -> Result<()> {
        let mut cache = self.lock_cache()?;
        self.ensure_loaded(&mut cache, &game.id)?;
        let existing = cache.get(&game.id);
        validate_append(existing.map(Record::game), game, state, mv)?;

        let updated = match (existing, mv) {
            (Some(record), Some(mv)) => {
                let mut updated = record.clone();
                updated.append(game.clone(), state.blob.clone(), Some(mv.clone()))?;
                updated
            }
            _ => Record::build(
                "",
                game.clone(),
                vec![state.blob.clone()],
                Vec::new(),
                self.codecs.clone(),
            )?,
        };

        let path = self.record_path(&game.id);
        updated.save(&path)?;
        tracing::debug!(
            target: "runtime::repository",
            game_id = %game.id,
            version = game.version,
            encoding = %updated.encoding(),
            "saved record"
        );
        cache.insert(game.id.clone(), updated);
        Ok(())
    }

    fn list_games(&self) -> Result<Vec<GameId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.base_dir).map_err(RepositoryError::Io)? {
            let path = entry.map_err(RepositoryError::Io)?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(GameId::new(stem));
            }
        }
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
    use tempfile::TempDir;

    fn record(version: u64) -> GameRecord {
        GameRecord {
            name: "pig".into(),
            id: GameId::new("disk"),
            secret_salt: "ab".into(),
            version,
            winners: vec![],
            finished: false,
            num_players: 2,
            agents: vec![None, None],
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
            phase: 1,
            proposer: PlayerIndex::seat(0),
            timestamp: Utc::now(),
            blob: json!({}),
        }
    }

    #[test]
    fn test_save_and_reload_from_disk() {
        let dir = TempDir::new().unwrap();
        let id = GameId::new("disk");
        {
            let repo = FileGameRepository::new(dir.path()).unwrap();
            repo.save_game_and_current_state(
                &record(0),
                &StateSnapshot::new(id.clone(), 0, json!({ "N": 0 })),
                None,
            )
            .unwrap();
            repo.save_game_and_current_state(
                &record(1),
                &StateSnapshot::new(id.clone(), 1, json!({ "N": 1 })),
                Some(&mv(1)),
            )
            .unwrap();
            assert!(repo.record_path(&id).exists());
        }

        let repo = FileGameRepository::new(dir.path()).unwrap();
        assert_eq!(repo.list_games().unwrap(), vec![id.clone()]);
        assert_eq!(repo.game(&id).unwrap().version, 1);
        assert_eq!(repo.state(&id, 0).unwrap().blob, json!({ "N": 0 }));
        assert_eq!(repo.move_record(&id, 1).unwrap().name, "Roll");
        assert!(repo.state(&id, 2).unwrap_err().is_not_found());
    }

    #[test]
    fn test_evict_rereads_hand_edits() {
        let dir = TempDir::new().unwrap();
        let id = GameId::new("disk");
        let repo = FileGameRepository::new(dir.path()).unwrap();
        repo.save_game_and_current_state(
            &record(0),
            &StateSnapshot::new(id.clone(), 0, json!({ "N": 0 })),
            None,
        )
        .unwrap();

        let mut on_disk = Record::load(repo.record_path(&id)).unwrap();
        on_disk.set_description("edited by hand");
        on_disk.save(repo.record_path(&id)).unwrap();

        repo.evict(&id);
        let reloaded = Record::load(repo.record_path(&id)).unwrap();
        assert_eq!(reloaded.description(), "edited by hand");
        assert_eq!(repo.game(&id).unwrap().version, 0);
    }

    #[test]
    fn test_missing_game_is_not_found() {
        let dir = TempDir::new().unwrap();
        let repo = FileGameRepository::new(dir.path()).unwrap();
        assert!(repo.game(&GameId::new("nope")).unwrap_err().is_not_found());
    }
}
