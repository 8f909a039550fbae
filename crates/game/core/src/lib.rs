//! Deterministic rule-engine primitives shared by the runtime and tools.
//!
//! `game-core` defines the persisted records, the [`RuleDelegate`] interface
//! a rule set implements, the deterministic PRNG, per-viewer sanitization,
//! and the pure [`GameEngine`] reducer. It performs no I/O; the runtime
//! decides when moves run and where their results are stored.
pub mod delegate;
pub mod engine;
pub mod error;
pub mod moves;
pub mod player;
pub mod records;
pub mod rng;
pub mod sanitize;
pub mod state;
pub mod variant;

pub use delegate::{GameContext, MoveConfig, MoveKind, PlayerCounts, RuleDelegate, StateOf};
pub use engine::{ExecuteError, GameEngine, Transition, TransitionPhase};
pub use error::{ApplyError, ErrorSeverity, IllegalMove, SetupError};
pub use moves::{GameMove, MoveCodecError, MoveContext, TimerRequest, encode_move, inflate_move};
pub use player::PlayerIndex;
pub use records::{GameId, GameRecord, MoveRecord, StateSnapshot};
pub use rng::StateRng;
pub use sanitize::{Group, Policy, SanitizationRule, SanitizationScope, sanitize_state};
pub use state::{
    Component, ComponentId, Stack, StackError, StackFull, StackHolder, StackOwner, StackRef, State,
    SubState,
};
pub use variant::{Variant, VariantCatalog, VariantError, VariantOption};
