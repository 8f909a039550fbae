//! The rule-set interface the engine is polymorphic over.
//!
//! A [`RuleDelegate`] describes one game: how to build its zero state, which
//! moves exist, what the engine should do on its own after every move, and
//! when the game is over. Everything else (queueing, persistence, replay) is
//! the runtime's business.

use serde::{Deserialize, Serialize};

use crate::error::SetupError;
use crate::moves::GameMove;
use crate::player::PlayerIndex;
use crate::records::GameId;
use crate::rng::StateRng;
use crate::sanitize::SanitizationRule;
use crate::state::{Component, StackRef, State, SubState};
use crate::variant::{Variant, VariantCatalog};

/// Full state type of delegate `D`.
pub type StateOf<D> = State<<D as RuleDelegate>::GameState, <D as RuleDelegate>::PlayerState>;

/// How the engine treats a move type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum MoveKind {
    /// Proposed by a seated player.
    Player,
    /// Proposed by the delegate after every applied move.
    FixUp,
    /// Proposed by the delegate when the mailbox reports a player to seat.
    SeatPlayer,
    /// Scheduled through a timer and fired by the engine.
    Timer,
}

impl MoveKind {
    /// Admin moves never come from a player proposal.
    pub const fn is_admin(self) -> bool {
        !matches!(self, Self::Player)
    }
}

/// Declares one move type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveConfig {
    /// Must equal the serialized `Name` of the corresponding move variant.
    pub name: String,
    pub kind: MoveKind,
    pub help_text: String,
}

impl MoveConfig {
    pub fn new(name: impl Into<String>, kind: MoveKind, help_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            help_text: help_text.into(),
        }
    }

    pub fn player(name: impl Into<String>, help_text: impl Into<String>) -> Self {
        Self::new(name, MoveKind::Player, help_text)
    }

    pub fn fix_up(name: impl Into<String>, help_text: impl Into<String>) -> Self {
        Self::new(name, MoveKind::FixUp, help_text)
    }
}

/// Allowed player counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerCounts {
    pub min: usize,
    pub max: usize,
    pub default: usize,
}

impl PlayerCounts {
    pub const fn new(min: usize, max: usize, default: usize) -> Self {
        Self { min, max, default }
    }

    pub const fn contains(&self, n: usize) -> bool {
        n >= self.min && n <= self.max
    }
}

impl Default for PlayerCounts {
    fn default() -> Self {
        Self::new(1, 8, 2)
    }
}

/// Read-only facts about the game a rule callback runs in.
#[derive(Clone, Copy, Debug)]
pub struct GameContext<'a> {
    pub game_id: &'a GameId,
    pub num_players: usize,
    pub variant: &'a Variant,
    /// Version of the state the callback is looking at.
    pub version: u64,
    /// True when the mailbox says this game will ever need seat moves.
    pub will_seat_player: bool,
}

/// Describes a specific game to the engine.
pub trait RuleDelegate: Send + Sync + Sized + 'static {
    type GameState: SubState;
    type PlayerState: SubState;
    type Move: GameMove<Self>;

    /// Rule-set name stored in every game record of this delegate.
    fn name(&self) -> &str;

    fn player_counts(&self) -> PlayerCounts {
        PlayerCounts::default()
    }

    fn variants(&self) -> VariantCatalog {
        VariantCatalog::default()
    }

    /// Zero-valued game-wide sub-state.
    fn game_state_constructor(&self) -> Self::GameState;

    /// Zero-valued sub-state for seat `index`.
    fn player_state_constructor(&self, index: PlayerIndex) -> Self::PlayerState;

    /// Every move type, in display order.
    fn configure_moves(&self) -> Vec<MoveConfig>;

    /// Static components dealt out during setup.
    fn components(&self) -> Vec<Component> {
        Vec::new()
    }

    fn distribute_component_to_starter_stack(
        &self,
        _state: &StateOf<Self>,
        component: &Component,
    ) -> Result<StackRef, SetupError> {
        Err(SetupError::Undistributed(component.id))
    }

    /// Runs on the zero state before components are dealt.
    fn begin_setup(
        &self,
        _state: &mut StateOf<Self>,
        _ctx: &GameContext<'_>,
    ) -> Result<(), SetupError> {
        Ok(())
    }

    /// Runs after components are dealt, with the version-0 generator.
    fn finish_setup(
        &self,
        _state: &mut StateOf<Self>,
        _rng: &mut StateRng,
    ) -> Result<(), SetupError> {
        Ok(())
    }

    fn check_game_finished(&self, state: &StateOf<Self>) -> (bool, Vec<PlayerIndex>);

    /// The next move the engine should apply on its own, if any.
    fn propose_fix_up_move(
        &self,
        state: &StateOf<Self>,
        ctx: &GameContext<'_>,
    ) -> Option<Self::Move>;

    fn phase(&self, _state: &StateOf<Self>) -> i64 {
        0
    }

    fn current_player(&self, _state: &StateOf<Self>) -> PlayerIndex {
        PlayerIndex::OBSERVER
    }

    /// Move that seats a waiting player in `seat`. `None` means the rule set
    /// does not support seating.
    fn seat_player_move(
        &self,
        _state: &StateOf<Self>,
        _seat: PlayerIndex,
        _ctx: &GameContext<'_>,
    ) -> Option<Self::Move> {
        None
    }

    fn sanitization_rules(&self) -> Vec<SanitizationRule> {
        Vec::new()
    }
}
