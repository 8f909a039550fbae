//! Pig: roll a single die as often as you dare, bust on a 1.
//!
//! Each turn the current player rolls and counts the die repeatedly. A 1
//! busts the round; stopping banks the round score. The first player to
//! reach the target score wins.
//!
//! With the `TurnTimer` variant, every `FinishTurn` starts a timer for the
//! turn it opens. Turn 0 is never timed: setup cannot schedule timers, so
//! the opening player has no deadline.

pub mod bot;
mod moves;
mod state;

pub use moves::PigMove;
pub use state::{DIE_STACK, PigGameState, PigPlayerState};

use game_core::{
    Component, GameContext, MoveConfig, MoveKind, PlayerCounts, PlayerIndex, Policy, RuleDelegate,
    SanitizationRule, SetupError, StackRef, StateOf, VariantCatalog, VariantOption,
};

pub const NAME: &str = "pig";

pub const TARGET_SCORE: &str = "TargetScore";
pub const TURN_TIMER: &str = "TurnTimer";

/// The Pig rule set.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pig;

impl Pig {
    fn finished_with(&self, state: &StateOf<Self>) -> Option<Vec<PlayerIndex>> {
        let best = state.players.iter().map(|p| p.total_score).max()?;
        if best < state.game.target_score {
            return None;
        }
        Some(
            state
                .players
                .iter()
                .enumerate()
                .filter(|(_, p)| p.total_score == best)
                .map(|(i, _)| PlayerIndex::seat(i))
                .collect(),
        )
    }
}

fn parse_timer(value: &str) -> Result<u64, SetupError> {
    if value == "off" {
        return Ok(0);
    }
    value
        .strip_suffix('s')
        .and_then(|secs| secs.parse().ok())
        .ok_or_else(|| SetupError::Rule(format!("unreadable turn timer {value:?}")))
}

impl RuleDelegate for Pig {
    type GameState = PigGameState;
    type PlayerState = PigPlayerState;
    type Move = PigMove;

    fn name(&self) -> &str {
        NAME
    }

    fn player_counts(&self) -> PlayerCounts {
        PlayerCounts::new(1, 6, 2)
    }

    fn variants(&self) -> VariantCatalog {
        VariantCatalog::new(vec![
            VariantOption::new(TARGET_SCORE, ["100", "50", "20"]),
            VariantOption::new(TURN_TIMER, ["off", "30s", "120s"]),
        ])
    }

    fn game_state_constructor(&self) -> PigGameState {
        PigGameState::default()
    }

    fn player_state_constructor(&self, _index: PlayerIndex) -> PigPlayerState {
        PigPlayerState::default()
    }

    fn configure_moves(&self) -> Vec<MoveConfig> {
        vec![
            MoveConfig::player("Roll", "Roll the die"),
            MoveConfig::player("CountDie", "Count the die you just rolled"),
            MoveConfig::player("Done", "Stop rolling and bank your round score"),
            MoveConfig::fix_up("FinishTurn", "Pass the die to the next player"),
            MoveConfig::new("SeatPlayer", MoveKind::SeatPlayer, "Seat a waiting player"),
            MoveConfig::new("TurnExpired", MoveKind::Timer, "End a turn that took too long"),
        ]
    }

    fn components(&self) -> Vec<Component> {
        vec![Component::new(0, "dice").with_values(serde_json::json!({ "Sides": 6 }))]
    }

    fn distribute_component_to_starter_stack(
        &self,
        _state: &StateOf<Self>,
        _component: &Component,
    ) -> Result<StackRef, SetupError> {
        Ok(StackRef::game(DIE_STACK))
    }

    fn begin_setup(
        &self,
        state: &mut StateOf<Self>,
        ctx: &GameContext<'_>,
    ) -> Result<(), SetupError> {
        if let Some(target) = ctx.variant.get(TARGET_SCORE) {
            state.game.target_score = target
                .parse()
                .map_err(|_| SetupError::Rule(format!("unreadable target score {target:?}")))?;
        }
        if let Some(timer) = ctx.variant.get(TURN_TIMER) {
            state.game.timer_secs = parse_timer(timer)?;
        }
        if ctx.will_seat_player {
            for (i, player) in state.players.iter_mut().enumerate() {
                player.seated = i == 0;
            }
        }
        Ok(())
    }

    fn check_game_finished(&self, state: &StateOf<Self>) -> (bool, Vec<PlayerIndex>) {
        match self.finished_with(state) {
            Some(winners) => (true, winners),
            None => (false, Vec::new()),
        }
    }

    fn propose_fix_up_move(
        &self,
        state: &StateOf<Self>,
        _ctx: &GameContext<'_>,
    ) -> Option<PigMove> {
        if self.finished_with(state).is_some() {
            return None;
        }
        let current = state.player(state.game.current_player)?;
        current.turn_over().then_some(PigMove::FinishTurn {})
    }

    fn phase(&self, state: &StateOf<Self>) -> i64 {
        if state.players.iter().all(|p| p.seated) {
            1
        } else {
            0
        }
    }

    fn current_player(&self, state: &StateOf<Self>) -> PlayerIndex {
        state.game.current_player
    }

    fn seat_player_move(
        &self,
        state: &StateOf<Self>,
        seat: PlayerIndex,
        _ctx: &GameContext<'_>,
    ) -> Option<PigMove> {
        let player = state.player(seat)?;
        (!player.seated).then_some(PigMove::SeatPlayer {
            target_player_index: seat,
        })
    }

    fn sanitization_rules(&self) -> Vec<SanitizationRule> {
        vec![SanitizationRule::game(DIE_STACK, Policy::Order)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_core::{GameEngine, GameId, GameMove, StateRng, Variant};

    fn context<'a>(id: &'a GameId, variant: &'a Variant, seat: bool) -> GameContext<'a> {
        GameContext {
            game_id: id,
            num_players: 2,
            variant,
            version: 0,
            will_seat_player: seat,
        }
    }

    fn setup(variant: &Variant, seat: bool) -> StateOf<Pig> {
        let engine = GameEngine::new(&Pig);
        let (n, variant) = engine.resolve_config(Some(2), variant).unwrap();
        assert_eq!(n, 2);
        let id = GameId::new("pig-test");
        engine
            .setup(&context(&id, &variant, seat), b"salt")
            .unwrap()
    }

    #[test]
    fn test_setup_deals_die_and_reads_variant() {
        let state = setup(&Variant::new().with(TARGET_SCORE, "20"), false);
        assert_eq!(state.game.die.len(), 1);
        assert_eq!(state.game.target_score, 20);
        assert_eq!(state.game.timer_secs, 0);
        assert!(state.players.iter().all(|p| p.seated && p.die_counted));
    }

    #[test]
    fn test_opening_turn_is_untimed() {
        let engine = GameEngine::new(&Pig);
        let variant = Variant::new().with(TURN_TIMER, "30s");
        let id = GameId::new("pig-test");
        let state = setup(&variant, false);
        assert_eq!(state.game.timer_secs, 30);

        let rolled = engine
            .execute(
                &state,
                &PigMove::Roll {},
                PlayerIndex::seat(0),
                context(&id, &variant, false),
                StateRng::from_seed(0),
            )
            .unwrap();
        assert!(rolled.timers.is_empty());
        assert_eq!(rolled.state.game.turn_count, 0);
    }

    #[test]
    fn test_will_seat_player_leaves_later_seats_empty() {
        let state = setup(&Variant::new(), true);
        assert!(state.players[0].seated);
        assert!(!state.players[1].seated);
        assert_eq!(Pig.phase(&state), 0);
    }

    #[test]
    fn test_roll_then_count_follows_die() {
        let engine = GameEngine::new(&Pig);
        let variant = Variant::new();
        let id = GameId::new("pig-test");
        let state = setup(&variant, false);

        let rolled = engine
            .execute(
                &state,
                &PigMove::Roll {},
                PlayerIndex::seat(0),
                context(&id, &variant, false),
                StateRng::for_version(b"salt", 1),
            )
            .unwrap()
            .state;
        assert!((1..=6).contains(&rolled.game.die_value));
        assert!(!rolled.players[0].die_counted);

        let counted = engine
            .execute(
                &rolled,
                &PigMove::CountDie {},
                PlayerIndex::seat(0),
                context(&id, &variant, false),
                StateRng::for_version(b"salt", 2),
            )
            .unwrap()
            .state;
        if rolled.game.die_value == 1 {
            assert!(counted.players[0].busted);
            assert_eq!(
                Pig.propose_fix_up_move(&counted, &context(&id, &variant, false)),
                Some(PigMove::FinishTurn {})
            );
        } else {
            assert_eq!(counted.players[0].round_score, i64::from(rolled.game.die_value));
        }
    }

    #[test]
    fn test_only_current_player_may_roll() {
        let variant = Variant::new();
        let id = GameId::new("pig-test");
        let state = setup(&variant, false);
        let ctx = context(&id, &variant, false);
        assert!(PigMove::Roll {}.legal(&state, PlayerIndex::seat(1), &ctx).is_err());
        assert!(PigMove::Roll {}.legal(&state, PlayerIndex::ADMIN, &ctx).is_err());
        assert!(PigMove::FinishTurn {}.legal(&state, PlayerIndex::ADMIN, &ctx).is_err());
    }

    #[test]
    fn test_finish_turn_banks_and_passes() {
        let engine = GameEngine::new(&Pig);
        let variant = Variant::new().with(TURN_TIMER, "30s");
        let id = GameId::new("pig-test");
        let mut state = setup(&variant, false);
        state.players[0].round_score = 12;
        state.players[0].done = true;

        let transition = engine
            .execute(
                &state,
                &PigMove::FinishTurn {},
                PlayerIndex::ADMIN,
                context(&id, &variant, false),
                StateRng::from_seed(0),
            )
            .unwrap();
        let next = transition.state;
        assert_eq!(next.players[0].total_score, 12);
        assert_eq!(next.players[0].round_score, 0);
        assert_eq!(next.game.current_player, PlayerIndex::seat(1));
        assert_eq!(next.game.turn_count, 1);
        assert_eq!(transition.timers.len(), 1);
        assert_eq!(transition.timers[0].mv, PigMove::TurnExpired { turn: 1 });
    }

    #[test]
    fn test_winners_are_highest_totals() {
        let mut state = setup(&Variant::new().with(TARGET_SCORE, "20"), false);
        assert_eq!(Pig.check_game_finished(&state), (false, vec![]));
        state.players[0].total_score = 21;
        state.players[1].total_score = 21;
        let (finished, winners) = Pig.check_game_finished(&state);
        assert!(finished);
        assert_eq!(winners, vec![PlayerIndex::seat(0), PlayerIndex::seat(1)]);
    }

    #[test]
    fn test_seat_move_targets_unseated_only() {
        let variant = Variant::new();
        let id = GameId::new("pig-test");
        let state = setup(&variant, true);
        let ctx = context(&id, &variant, true);
        let mv = Pig.seat_player_move(&state, PlayerIndex::seat(1), &ctx).unwrap();
        assert_eq!(mv.seat_target(), Some(PlayerIndex::seat(1)));
        assert!(Pig.seat_player_move(&state, PlayerIndex::seat(0), &ctx).is_none());
    }
}
