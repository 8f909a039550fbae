//! Pig moves.

use std::time::Duration;

use game_core::{
    ApplyError, GameContext, GameMove, IllegalMove, MoveContext, PlayerIndex, StateOf,
};
use serde::{Deserialize, Serialize};

use super::Pig;
use super::state::PigPlayerState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Name", content = "Blob", rename_all_fields = "PascalCase")]
pub enum PigMove {
    /// Roll the die.
    Roll {},
    /// Bank the face showing, or bust on a 1.
    CountDie {},
    /// Stop rolling and keep the round score.
    Done {},
    /// Close the current turn and pass the die on.
    FinishTurn {},
    /// Seat a waiting player.
    SeatPlayer { target_player_index: PlayerIndex },
    /// The turn numbered `turn` ran out of time.
    TurnExpired { turn: u64 },
}

type PigState = StateOf<Pig>;

fn acting_player<'s>(
    state: &'s PigState,
    proposer: PlayerIndex,
) -> Result<&'s PigPlayerState, IllegalMove> {
    let current = state.game.current_player;
    if proposer != current {
        return Err(IllegalMove::not_current_player(proposer, current));
    }
    let player = state
        .player(proposer)
        .ok_or_else(|| IllegalMove::new(format!("{proposer} has no seat")))?;
    if !player.seated {
        return Err(IllegalMove::new(format!("{proposer} is not seated yet")));
    }
    Ok(player)
}

fn require_admin(proposer: PlayerIndex) -> Result<(), IllegalMove> {
    if proposer.is_admin() {
        Ok(())
    } else {
        Err(IllegalMove::new("only the engine may make this move"))
    }
}

fn current_mut(state: &mut PigState) -> Result<&mut PigPlayerState, ApplyError> {
    let current = state.game.current_player;
    state
        .player_mut(current)
        .ok_or_else(|| ApplyError::new(format!("current player {current} has no seat")))
}

/// Next seated player after `from`, or `from` itself when nobody else sits.
fn next_seated(state: &PigState, from: PlayerIndex) -> PlayerIndex {
    let n = state.num_players();
    let mut candidate = from;
    for _ in 0..n {
        candidate = candidate.next(n);
        if state.player(candidate).is_some_and(|p| p.seated) {
            return candidate;
        }
    }
    from
}

impl GameMove<Pig> for PigMove {
    fn legal(
        &self,
        state: &PigState,
        proposer: PlayerIndex,
        _ctx: &GameContext<'_>,
    ) -> Result<(), IllegalMove> {
        match self {
            PigMove::Roll {} => {
                let player = acting_player(state, proposer)?;
                if player.turn_over() {
                    return Err(IllegalMove::new("turn is already over"));
                }
                if !player.die_counted {
                    return Err(IllegalMove::new("count the die before rolling again"));
                }
                Ok(())
            }
            PigMove::CountDie {} => {
                let player = acting_player(state, proposer)?;
                if player.die_counted {
                    return Err(IllegalMove::new("the die has already been counted"));
                }
                Ok(())
            }
            PigMove::Done {} => {
                let player = acting_player(state, proposer)?;
                if player.turn_over() {
                    return Err(IllegalMove::new("turn is already over"));
                }
                if !player.die_counted {
                    return Err(IllegalMove::new("count the die before stopping"));
                }
                Ok(())
            }
            PigMove::FinishTurn {} => {
                require_admin(proposer)?;
                let over = state
                    .player(state.game.current_player)
                    .is_some_and(PigPlayerState::turn_over);
                if !over {
                    return Err(IllegalMove::new("current turn is still running"));
                }
                Ok(())
            }
            PigMove::SeatPlayer {
                target_player_index,
            } => {
                require_admin(proposer)?;
                match state.player(*target_player_index) {
                    None => Err(IllegalMove::new(format!(
                        "{target_player_index} is not a seat in this game"
                    ))),
                    Some(p) if p.seated => Err(IllegalMove::new(format!(
                        "{target_player_index} is already seated"
                    ))),
                    Some(_) => Ok(()),
                }
            }
            PigMove::TurnExpired { turn } => {
                require_admin(proposer)?;
                if *turn != state.game.turn_count {
                    return Err(IllegalMove::new(format!(
                        "turn {turn} already ended (now turn {})",
                        state.game.turn_count
                    )));
                }
                let over = state
                    .player(state.game.current_player)
                    .is_none_or(PigPlayerState::turn_over);
                if over {
                    return Err(IllegalMove::new("turn is already over"));
                }
                Ok(())
            }
        }
    }

    fn apply(
        &self,
        state: &mut PigState,
        ctx: &mut MoveContext<'_, PigMove>,
    ) -> Result<(), ApplyError> {
        match self {
            PigMove::Roll {} => {
                let value = ctx.rng().roll_die(6);
                state.game.die_value = value;
                current_mut(state)?.die_counted = false;
            }
            PigMove::CountDie {} => {
                let value = state.game.die_value;
                let player = current_mut(state)?;
                player.die_counted = true;
                if value == 1 {
                    player.busted = true;
                    player.round_score = 0;
                } else {
                    player.round_score += i64::from(value);
                }
            }
            PigMove::Done {} => {
                current_mut(state)?.done = true;
            }
            PigMove::FinishTurn {} => {
                let player = current_mut(state)?;
                if !player.busted {
                    player.total_score += player.round_score;
                }
                player.reset_round();
                state.game.current_player = next_seated(state, state.game.current_player);
                state.game.turn_count += 1;
                if state.game.timer_secs > 0 {
                    ctx.start_timer(
                        Duration::from_secs(state.game.timer_secs),
                        PigMove::TurnExpired {
                            turn: state.game.turn_count,
                        },
                    );
                }
            }
            PigMove::SeatPlayer {
                target_player_index,
            } => {
                let player = state.player_mut(*target_player_index).ok_or_else(|| {
                    ApplyError::new(format!("{target_player_index} has no seat"))
                })?;
                player.seated = true;
            }
            PigMove::TurnExpired { .. } => {
                let player = current_mut(state)?;
                if !player.die_counted {
                    // An uncounted roll is forfeited.
                    player.die_counted = true;
                }
                player.done = true;
            }
        }
        Ok(())
    }

    fn seat_target(&self) -> Option<PlayerIndex> {
        match self {
            PigMove::SeatPlayer {
                target_player_index,
            } => Some(*target_player_index),
            _ => None,
        }
    }
}
