//! Setup and move execution pipeline.
//!
//! The [`GameEngine`] is the pure reducer over a delegate's states. It never
//! touches storage or clocks; the runtime decides when to call it and what
//! to do with the resulting [`Transition`].

mod errors;

pub use errors::{ExecuteError, TransitionPhase};

use serde_json::Value;

use crate::delegate::{GameContext, RuleDelegate, StateOf};
use crate::error::SetupError;
use crate::moves::{GameMove, MoveContext, TimerRequest, encode_move};
use crate::player::PlayerIndex;
use crate::rng::StateRng;
use crate::state::State;
use crate::variant::Variant;

/// Complete outcome of applying one move.
pub struct Transition<D: RuleDelegate> {
    pub name: String,
    pub blob: Value,
    /// The new state. The predecessor is left untouched.
    pub state: StateOf<D>,
    /// Timers the move requested; to be registered once it commits.
    pub timers: Vec<TimerRequest<D::Move>>,
}

/// Stateless facade that drives a delegate through setup and moves.
pub struct GameEngine<'a, D: RuleDelegate> {
    delegate: &'a D,
}

impl<'a, D: RuleDelegate> GameEngine<'a, D> {
    pub fn new(delegate: &'a D) -> Self {
        Self { delegate }
    }

    /// Validates the requested player count and completes the variant.
    pub fn resolve_config(
        &self,
        num_players: Option<usize>,
        variant: &Variant,
    ) -> Result<(usize, Variant), SetupError> {
        let counts = self.delegate.player_counts();
        let requested = num_players.unwrap_or(counts.default);
        if !counts.contains(requested) {
            return Err(SetupError::PlayerCount {
                requested,
                min: counts.min,
                max: counts.max,
            });
        }
        let variant = self.delegate.variants().complete(variant)?;
        Ok((requested, variant))
    }

    /// Builds version 0 of a game.
    pub fn setup(&self, ctx: &GameContext<'_>, salt: &[u8]) -> Result<StateOf<D>, SetupError> {
        let counts = self.delegate.player_counts();
        if !counts.contains(ctx.num_players) {
            return Err(SetupError::PlayerCount {
                requested: ctx.num_players,
                min: counts.min,
                max: counts.max,
            });
        }

        let players = (0..ctx.num_players)
            .map(|i| self.delegate.player_state_constructor(PlayerIndex::seat(i)))
            .collect();
        let mut state = State::new(self.delegate.game_state_constructor(), players);

        self.delegate.begin_setup(&mut state, ctx)?;

        for component in self.delegate.components() {
            let target = self
                .delegate
                .distribute_component_to_starter_stack(&state, &component)?;
            state.deal(&target, component.id)?;
        }

        let mut rng = StateRng::for_version(salt, 0);
        self.delegate.finish_setup(&mut state, &mut rng)?;
        Ok(state)
    }

    pub fn check_legal(
        &self,
        state: &StateOf<D>,
        mv: &D::Move,
        proposer: PlayerIndex,
        ctx: &GameContext<'_>,
    ) -> Result<(), ExecuteError> {
        mv.legal(state, proposer, ctx)
            .map_err(|source| ExecuteError::Illegal {
                name: move_name(mv),
                source,
            })
    }

    /// Applies `mv` to a private copy of `state`.
    ///
    /// Legality is not re-checked here; callers run [`Self::check_legal`]
    /// first (or use [`Self::execute`]).
    pub fn apply(
        &self,
        state: &StateOf<D>,
        mv: &D::Move,
        ctx: GameContext<'_>,
        rng: StateRng,
    ) -> Result<Transition<D>, ExecuteError> {
        let (name, blob) = encode_move(mv)?;
        let mut next = state.clone();
        let mut move_ctx = MoveContext::new(ctx, rng);
        mv.apply(&mut next, &mut move_ctx)
            .map_err(|source| ExecuteError::Apply {
                name: name.clone(),
                source,
            })?;
        Ok(Transition {
            name,
            blob,
            state: next,
            timers: move_ctx.into_timers(),
        })
    }

    pub fn execute(
        &self,
        state: &StateOf<D>,
        mv: &D::Move,
        proposer: PlayerIndex,
        ctx: GameContext<'_>,
        rng: StateRng,
    ) -> Result<Transition<D>, ExecuteError> {
        self.check_legal(state, mv, proposer, &ctx)?;
        self.apply(state, mv, ctx, rng)
    }

    /// Serializes `state` and checks that it deserializes back to itself.
    pub fn verify_round_trip(&self, state: &StateOf<D>) -> Result<Value, ExecuteError> {
        let value = serde_json::to_value(state)
            .map_err(|err| ExecuteError::StateRoundTrip(err.to_string()))?;
        let back: StateOf<D> = serde_json::from_value(value.clone())
            .map_err(|err| ExecuteError::StateRoundTrip(err.to_string()))?;
        if &back != state {
            return Err(ExecuteError::StateRoundTrip(
                "deserialized state differs from the original".to_string(),
            ));
        }
        Ok(value)
    }
}

fn move_name<M: serde::Serialize>(mv: &M) -> String {
    encode_move(mv)
        .map(|(name, _)| name)
        .unwrap_or_else(|_| "<unencodable>".to_string())
}
