//! Concrete rule sets built on `game-core`.
//!
//! Each rule set is a [`game_core::RuleDelegate`] implementation plus its
//! move and state types. The runtime and developer tools pick a rule set by
//! its [`RuleDelegate::name`](game_core::RuleDelegate::name).

pub mod pig;

pub use pig::{Pig, PigGameState, PigMove, PigPlayerState};
