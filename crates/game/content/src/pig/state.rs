//! Pig sub-states.

use game_core::{PlayerIndex, Stack, StackHolder};
use serde::{Deserialize, Serialize};

pub const DIE_STACK: &str = "Die";

/// Game-wide Pig state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PigGameState {
    pub current_player: PlayerIndex,
    /// Holds the single die component.
    pub die: Stack,
    /// Face showing after the last roll; 0 before the first roll.
    pub die_value: u32,
    pub target_score: i64,
    pub turn_count: u64,
    /// Seconds a turn may last; 0 disables turn timers.
    pub timer_secs: u64,
}

impl Default for PigGameState {
    fn default() -> Self {
        Self {
            current_player: PlayerIndex::seat(0),
            die: Stack::bounded(1),
            die_value: 0,
            target_score: 100,
            turn_count: 0,
            timer_secs: 0,
        }
    }
}

impl StackHolder for PigGameState {
    fn stack(&self, name: &str) -> Option<&Stack> {
        (name == DIE_STACK).then_some(&self.die)
    }

    fn stack_mut(&mut self, name: &str) -> Option<&mut Stack> {
        (name == DIE_STACK).then_some(&mut self.die)
    }
}

/// Per-seat Pig state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PigPlayerState {
    pub busted: bool,
    pub done: bool,
    /// False between a roll and the matching count.
    pub die_counted: bool,
    pub round_score: i64,
    pub total_score: i64,
    pub seated: bool,
}

impl Default for PigPlayerState {
    fn default() -> Self {
        Self {
            busted: false,
            done: false,
            die_counted: true,
            round_score: 0,
            total_score: 0,
            seated: true,
        }
    }
}

impl PigPlayerState {
    /// True once the turn is over and a `FinishTurn` is due.
    pub fn turn_over(&self) -> bool {
        self.busted || self.done
    }

    pub fn reset_round(&mut self) {
        self.busted = false;
        self.done = false;
        self.die_counted = true;
        self.round_score = 0;
    }
}

impl StackHolder for PigPlayerState {}
