//! On-disk game record: metadata, move list, and encoded state history.
//!
//! A record file is a single JSON object:
//!
//! ```text
//! { "Description": "...", "Game": {..}, "Moves": [..], "StatePatches": [..] }
//! ```
//!
//! Moves are written in relative form (`Version = -1`, `Initiator` as a
//! non-positive offset, `Timestamp` relative to `Game.Created`) so that moves
//! can be inserted or removed by hand. Readers accept relative and absolute
//! forms alike.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, Utc};
use game_core::{GameRecord, MoveRecord, PlayerIndex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{CodecError, Codecs, EncodingKind};
use crate::repository::RepositoryError;

/// Timestamps before this year are durations relative to `Game.Created`.
const RELATIVE_TIMESTAMP_CUTOFF_YEAR: i32 = 2000;

const LEGACY_VERSION_KEY: &str = "Version";

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordFile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    game: GameRecord,
    #[serde(default)]
    moves: Vec<StoredMove>,
    #[serde(default)]
    state_patches: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StoredMove {
    name: String,
    version: i64,
    initiator: i64,
    #[serde(default)]
    phase: i64,
    proposer: PlayerIndex,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    blob: Value,
}

impl StoredMove {
    fn relative(mv: &MoveRecord, created: DateTime<Utc>) -> Self {
        Self {
            name: mv.name.clone(),
            version: -1,
            initiator: -(mv.initiator_offset() as i64),
            phase: mv.phase,
            proposer: mv.proposer,
            timestamp: DateTime::<Utc>::UNIX_EPOCH + (mv.timestamp - created),
            blob: mv.blob.clone(),
        }
    }

    fn absolute(self, index: usize, created: DateTime<Utc>) -> Result<MoveRecord, RepositoryError> {
        let version = if self.version < 0 {
            index as u64 + 1
        } else {
            self.version as u64
        };
        let initiator = if self.initiator <= 0 {
            version
                .checked_sub(self.initiator.unsigned_abs())
                .filter(|v| *v >= 1)
                .ok_or_else(|| {
                    RepositoryError::CorruptedData(format!(
                        "move {version} points {} versions back, before the first move",
                        self.initiator.unsigned_abs()
                    ))
                })?
        } else {
            self.initiator as u64
        };
        let timestamp = if self.timestamp.year() < RELATIVE_TIMESTAMP_CUTOFF_YEAR {
            created + (self.timestamp - DateTime::<Utc>::UNIX_EPOCH)
        } else {
            self.timestamp
        };
        Ok(MoveRecord {
            name: self.name,
            version,
            initiator,
            phase: self.phase,
            proposer: self.proposer,
            timestamp,
            blob: self.blob,
        })
    }
}

/// Removes the top-level `Version` key some older states carry.
fn strip_legacy_version(mut state: Value) -> Value {
    if let Some(map) = state.as_object_mut() {
        map.remove(LEGACY_VERSION_KEY);
    }
    state
}

/// A game record with lazily materialized states.
pub struct Record {
    description: String,
    game: GameRecord,
    moves: Vec<MoveRecord>,
    patches: Vec<Value>,
    encoding: EncodingKind,
    codecs: Codecs,
    /// Raw (unstripped) states for versions `0..len`.
    states: Mutex<Vec<Value>>,
}

impl Record {
    /// Encodes a complete history, falling back from diff to full encoding
    /// when any diff patch fails confirmation.
    pub fn build(
        description: impl Into<String>,
        game: GameRecord,
        states: Vec<Value>,
        moves: Vec<MoveRecord>,
        codecs: Codecs,
    ) -> Result<Self, CodecError> {
        let (encoding, patches) = encode_with_fallback(&codecs, &states)?;
        Ok(Self {
            description: description.into(),
            game,
            moves,
            patches,
            encoding,
            codecs,
            states: Mutex::new(states),
        })
    }

    /// Appends the next version (or replaces metadata only when `mv` is
    /// `None`).
    ///
    /// In diff mode only the new patch is created; if it fails confirmation
    /// the whole record converts to full encoding. In full mode the history is
    /// re-encoded as diffs and kept that way if every patch confirms.
    pub fn append(
        &mut self,
        game: GameRecord,
        state: Value,
        mv: Option<MoveRecord>,
    ) -> Result<(), CodecError> {
        let mut states = self.materialize_all()?;
        let appending = mv.is_some();
        if appending || states.is_empty() {
            states.push(state);
        } else if let Some(last) = states.last_mut() {
            *last = state;
        }

        let last = states.len() - 1;
        let (encoding, patches) = if self.encoding == EncodingKind::Diff {
            let prev = match last {
                0 => Value::Object(Map::new()),
                _ => states[last - 1].clone(),
            };
            let diff = self.codecs.get(EncodingKind::Diff);
            let patch = diff.create_patch(&prev, &states[last]).and_then(|patch| {
                diff.confirm_patch(&prev, &states[last], &patch, last as u64)
                    .map(|_| patch)
            });
            match patch {
                Ok(patch) => {
                    let mut patches = self.patches[..last.min(self.patches.len())].to_vec();
                    patches.push(patch);
                    (EncodingKind::Diff, patches)
                }
                Err(err) => {
                    tracing::warn!(
                        target: "runtime::codec",
                        game_id = %game.id,
                        version = last,
                        error = %err,
                        "diff patch failed confirmation, converting record to full encoding"
                    );
                    let patches = self.codecs.encode_history(EncodingKind::Full, &states)?;
                    (EncodingKind::Full, patches)
                }
            }
        } else {
            let (encoding, patches) = encode_with_fallback(&self.codecs, &states)?;
            if encoding != self.encoding {
                tracing::info!(
                    target: "runtime::codec",
                    game_id = %game.id,
                    from = %self.encoding,
                    to = %encoding,
                    "record encoding changed"
                );
            }
            (encoding, patches)
        };

        if let Some(mv) = mv {
            self.moves.push(mv);
        }
        self.game = game;
        self.encoding = encoding;
        self.patches = patches;
        *self.states.lock().unwrap_or_else(PoisonError::into_inner) = states;
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, RepositoryError> {
        Self::from_json_str_with(json, Codecs::default())
    }

    pub fn from_json_str_with(json: &str, codecs: Codecs) -> Result<Self, RepositoryError> {
        let file: RecordFile = serde_json::from_str(json)?;
        let created = file.game.created;

        let moves = file
            .moves
            .into_iter()
            .enumerate()
            .map(|(i, mv)| mv.absolute(i, created))
            .collect::<Result<Vec<_>, _>>()?;

        let encoding = match file.state_patches.first() {
            Some(first) => codecs.detect(first)?,
            None => EncodingKind::Diff,
        };

        if !file.state_patches.is_empty() && file.state_patches.len() != moves.len() + 1 {
            return Err(RepositoryError::CorruptedData(format!(
                "record {} has {} moves but {} state patches",
                file.game.id,
                moves.len(),
                file.state_patches.len()
            )));
        }

        Ok(Self {
            description: file.description,
            game: file.game,
            moves,
            patches: file.state_patches,
            encoding,
            codecs,
            states: Mutex::new(Vec::new()),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        Self::load_with(path, Codecs::default())
    }

    pub fn load_with(path: impl AsRef<Path>, codecs: Codecs) -> Result<Self, RepositoryError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json_str_with(&contents, codecs)
    }

    pub fn to_json_string(&self) -> Result<String, RepositoryError> {
        let created = self.game.created;
        let file = RecordFile {
            description: self.description.clone(),
            game: self.game.clone(),
            moves: self
                .moves
                .iter()
                .map(|mv| StoredMove::relative(mv, created))
                .collect(),
            state_patches: self.patches.clone(),
        };
        let mut json = serde_json::to_string_pretty(&file)?;
        json.push('\n');
        Ok(json)
    }

    /// Writes the record atomically (temp file, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RepositoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, self.to_json_string()?)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn game(&self) -> &GameRecord {
        &self.game
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn encoding(&self) -> EncodingKind {
        self.encoding
    }

    pub fn patches(&self) -> &[Value] {
        &self.patches
    }

    /// Highest version with a stored state.
    pub fn last_version(&self) -> Option<u64> {
        (self.patches.len() as u64).checked_sub(1)
    }

    /// Move that produced `version`; `None` past the end of the transcript.
    pub fn move_record(&self, version: u64) -> Option<&MoveRecord> {
        let index = usize::try_from(version.checked_sub(1)?).ok()?;
        self.moves.get(index)
    }

    /// State at `version`; `None` past the end of the transcript.
    pub fn state(&self, version: u64) -> Result<Option<Value>, CodecError> {
        let Ok(target) = usize::try_from(version) else {
            return Ok(None);
        };
        if target >= self.patches.len() {
            return Ok(None);
        }
        let mut cache = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        self.fill_cache(&mut cache, target)?;
        Ok(Some(strip_legacy_version(cache[target].clone())))
    }

    fn fill_cache(&self, cache: &mut Vec<Value>, target: usize) -> Result<(), CodecError> {
        let encoder = self.codecs.get(self.encoding);
        while cache.len() <= target {
            let next = cache.len();
            let prev = cache
                .last()
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            cache.push(encoder.apply_patch(&prev, &self.patches[next])?);
        }
        Ok(())
    }

    /// Every state, stripped of legacy keys.
    fn materialize_all(&self) -> Result<Vec<Value>, CodecError> {
        if self.patches.is_empty() {
            return Ok(Vec::new());
        }
        let mut cache = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        self.fill_cache(&mut cache, self.patches.len() - 1)?;
        Ok(cache
            .iter()
            .take(self.patches.len())
            .cloned()
            .map(strip_legacy_version)
            .collect())
    }
}

impl Clone for Record {
    fn clone(&self) -> Self {
        let states = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Self {
            description: self.description.clone(),
            game: self.game.clone(),
            moves: self.moves.clone(),
            patches: self.patches.clone(),
            encoding: self.encoding,
            codecs: self.codecs.clone(),
            states: Mutex::new(states),
        }
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("game", &self.game.id)
            .field("version", &self.game.version)
            .field("moves", &self.moves.len())
            .field("encoding", &self.encoding)
            .finish()
    }
}

fn encode_with_fallback(
    codecs: &Codecs,
    states: &[Value],
) -> Result<(EncodingKind, Vec<Value>), CodecError> {
    match codecs.encode_history(EncodingKind::Diff, states) {
        Ok(patches) => Ok((EncodingKind::Diff, patches)),
        Err(err) => {
            tracing::warn!(
                target: "runtime::codec",
                error = %err,
                "diff encoding failed confirmation, falling back to full encoding"
            );
            let patches = codecs.encode_history(EncodingKind::Full, states)?;
            Ok((EncodingKind::Full, patches))
        }
    }
}
