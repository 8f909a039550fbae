//! A scripted Pig player for recording games.

use game_core::{PlayerIndex, StateOf};

use super::{Pig, PigMove};

/// Next move of the current player under a "hold at `threshold`" strategy:
/// keep rolling until the round is worth `threshold` points or would win.
///
/// Returns `None` while the engine owes a move (the turn is over) or when the
/// current seat is empty.
pub fn hold_at(state: &StateOf<Pig>, threshold: i64) -> Option<(PlayerIndex, PigMove)> {
    let seat = state.game.current_player;
    let player = state.player(seat)?;
    if !player.seated || player.turn_over() {
        return None;
    }

    let mv = if !player.die_counted {
        PigMove::CountDie {}
    } else if player.round_score >= threshold
        || player.total_score + player.round_score >= state.game.target_score
    {
        PigMove::Done {}
    } else {
        PigMove::Roll {}
    };
    Some((seat, mv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_core::State;

    use crate::pig::{PigGameState, PigPlayerState};

    fn state() -> StateOf<Pig> {
        State::new(
            PigGameState::default(),
            vec![PigPlayerState::default(), PigPlayerState::default()],
        )
    }

    #[test]
    fn test_rolls_then_counts_then_holds() {
        let mut state = state();
        assert_eq!(hold_at(&state, 10), Some((PlayerIndex::seat(0), PigMove::Roll {})));

        state.players[0].die_counted = false;
        assert_eq!(hold_at(&state, 10), Some((PlayerIndex::seat(0), PigMove::CountDie {})));

        state.players[0].die_counted = true;
        state.players[0].round_score = 12;
        assert_eq!(hold_at(&state, 10), Some((PlayerIndex::seat(0), PigMove::Done {})));
    }

    #[test]
    fn test_waits_for_engine_after_bust() {
        let mut state = state();
        state.players[0].busted = true;
        assert_eq!(hold_at(&state, 10), None);
    }
}
