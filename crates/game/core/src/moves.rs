//! Move trait, move context, and the name/blob codec.
//!
//! Moves are a serde sum type per rule set, adjacently tagged as
//! `{"Name": .., "Blob": {..}}`. That tag is the only thing the runtime needs
//! to persist a move and to inflate it again from a stored record.

use core::fmt::Debug;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::delegate::{GameContext, RuleDelegate, StateOf};
use crate::error::{ApplyError, IllegalMove};
use crate::player::PlayerIndex;
use crate::rng::StateRng;

const NAME_KEY: &str = "Name";
const BLOB_KEY: &str = "Blob";

/// A move of rule set `D`.
pub trait GameMove<D: RuleDelegate>:
    Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Rejects the move if `proposer` may not make it against `state`.
    fn legal(
        &self,
        state: &StateOf<D>,
        proposer: PlayerIndex,
        ctx: &GameContext<'_>,
    ) -> Result<(), IllegalMove>;

    /// Mutates `state`. Only called after [`GameMove::legal`] passed; the
    /// state is a private copy and is discarded on error.
    fn apply(
        &self,
        state: &mut StateOf<D>,
        ctx: &mut MoveContext<'_, D::Move>,
    ) -> Result<(), ApplyError>;

    /// Seat this move fills, for seat-player moves.
    fn seat_target(&self) -> Option<PlayerIndex> {
        None
    }
}

/// A timer a move asked for. Registered only once the move commits.
#[derive(Clone, Debug, PartialEq)]
pub struct TimerRequest<M> {
    pub delay: Duration,
    pub mv: M,
}

/// Mutable context handed to [`GameMove::apply`].
pub struct MoveContext<'a, M> {
    game: GameContext<'a>,
    rng: StateRng,
    timers: Vec<TimerRequest<M>>,
}

impl<'a, M> MoveContext<'a, M> {
    pub fn new(game: GameContext<'a>, rng: StateRng) -> Self {
        Self {
            game,
            rng,
            timers: Vec::new(),
        }
    }

    pub fn game(&self) -> &GameContext<'a> {
        &self.game
    }

    /// Deterministic generator for the version being produced.
    pub fn rng(&mut self) -> &mut StateRng {
        &mut self.rng
    }

    /// Schedules `mv` to fire after `delay`.
    pub fn start_timer(&mut self, delay: Duration, mv: M) {
        self.timers.push(TimerRequest { delay, mv });
    }

    pub fn into_timers(self) -> Vec<TimerRequest<M>> {
        self.timers
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MoveCodecError {
    #[error("failed to serialize move: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("move serialized to an unexpected shape: {0}")]
    Shape(String),

    #[error("failed to inflate move {name:?}: {source}")]
    Inflate {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Splits a move into its `(Name, Blob)` pair.
pub fn encode_move<M: Serialize>(mv: &M) -> Result<(String, Value), MoveCodecError> {
    let value = serde_json::to_value(mv).map_err(MoveCodecError::Serialize)?;
    let Value::Object(mut map) = value else {
        return Err(MoveCodecError::Shape(value.to_string()));
    };
    let name = match map.remove(NAME_KEY) {
        Some(Value::String(name)) => name,
        other => {
            return Err(MoveCodecError::Shape(format!(
                "missing string {NAME_KEY}, found {other:?}"
            )));
        }
    };
    let blob = map
        .remove(BLOB_KEY)
        .unwrap_or_else(|| Value::Object(Map::new()));
    Ok((name, blob))
}

/// Rebuilds a move from a stored `(Name, Blob)` pair.
pub fn inflate_move<M: DeserializeOwned>(name: &str, blob: &Value) -> Result<M, MoveCodecError> {
    let mut map = Map::new();
    map.insert(NAME_KEY.to_string(), Value::String(name.to_string()));
    if !blob.is_null() {
        map.insert(BLOB_KEY.to_string(), blob.clone());
    }
    serde_json::from_value(Value::Object(map)).map_err(|source| MoveCodecError::Inflate {
        name: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "Name", content = "Blob")]
    enum Sample {
        Roll {},
        Seat {
            #[serde(rename = "TargetPlayerIndex")]
            target: PlayerIndex,
        },
    }

    #[test]
    fn test_encode_splits_name_and_blob() {
        let (name, blob) = encode_move(&Sample::Seat {
            target: PlayerIndex::seat(1),
        })
        .unwrap();
        assert_eq!(name, "Seat");
        assert_eq!(blob, json!({ "TargetPlayerIndex": 1 }));

        let (name, blob) = encode_move(&Sample::Roll {}).unwrap();
        assert_eq!(name, "Roll");
        assert_eq!(blob, json!({}));
    }

    #[test]
    fn test_inflate_rejects_unknown_name() {
        let mv: Sample = inflate_move("Roll", &json!({})).unwrap();
        assert_eq!(mv, Sample::Roll {});
        let err = inflate_move::<Sample>("Jump", &json!({})).unwrap_err();
        assert!(matches!(err, MoveCodecError::Inflate { .. }));
    }
}
