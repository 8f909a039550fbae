mod common;

use std::sync::Arc;

use game_core::{
    ApplyError, GameContext, GameMove, IllegalMove, MoveConfig, MoveContext, PlayerIndex,
    RuleDelegate, StackHolder, StateOf, Variant,
};
use runtime::{
    ErrorKind, Event, GameEvent, GameManager, InMemoryGameRepo, RuntimeConfig, RuntimeError, Topic,
};
use serde::{Deserialize, Serialize};

use common::init_tracing;

/// A rule set whose fix-up never settles once the game has started.
struct Looping;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoopState {
    started: bool,
    ticks: u64,
}

impl StackHolder for LoopState {}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct LoopPlayer {}

impl StackHolder for LoopPlayer {}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Name", content = "Blob")]
enum LoopMove {
    Start {},
    Tick {},
}

impl GameMove<Looping> for LoopMove {
    fn legal(
        &self,
        state: &StateOf<Looping>,
        proposer: PlayerIndex,
        _ctx: &GameContext<'_>,
    ) -> Result<(), IllegalMove> {
        match self {
            LoopMove::Start {} if state.game.started => Err(IllegalMove::new("already started")),
            LoopMove::Start {} => Ok(()),
            LoopMove::Tick {} if proposer.is_admin() => Ok(()),
            LoopMove::Tick {} => Err(IllegalMove::new("only the engine ticks")),
        }
    }

    fn apply(
        &self,
        state: &mut StateOf<Looping>,
        _ctx: &mut MoveContext<'_, LoopMove>,
    ) -> Result<(), ApplyError> {
        match self {
            LoopMove::Start {} => state.game.started = true,
            LoopMove::Tick {} => state.game.ticks += 1,
        }
        Ok(())
    }
}

impl RuleDelegate for Looping {
    type GameState = LoopState;
    type PlayerState = LoopPlayer;
    type Move = LoopMove;

    fn name(&self) -> &str {
        "looping"
    }

    fn game_state_constructor(&self) -> LoopState {
        LoopState::default()
    }

    fn player_state_constructor(&self, _index: PlayerIndex) -> LoopPlayer {
        LoopPlayer::default()
    }

    fn configure_moves(&self) -> Vec<MoveConfig> {
        vec![
            MoveConfig::player("Start", "Start ticking"),
            MoveConfig::fix_up("Tick", "Tick forever"),
        ]
    }

    fn check_game_finished(&self, _state: &StateOf<Self>) -> (bool, Vec<PlayerIndex>) {
        (false, Vec::new())
    }

    fn propose_fix_up_move(
        &self,
        state: &StateOf<Self>,
        _ctx: &GameContext<'_>,
    ) -> Option<LoopMove> {
        state.game.started.then_some(LoopMove::Tick {})
    }
}

#[tokio::test]
async fn test_runaway_fix_up_cascade_is_a_delegate_bug() {
    init_tracing();
    let config = RuntimeConfig {
        max_fix_up_cascade: 1000,
        ..RuntimeConfig::default()
    };
    let manager = GameManager::builder(Looping, Arc::new(InMemoryGameRepo::new()))
        .config(config)
        .build()
        .unwrap();
    let game = manager
        .new_game(None, &Variant::new(), Vec::new())
        .await
        .unwrap();
    assert_eq!(game.version().unwrap(), 0);
    let mut lifecycle = game.subscribe(Topic::Lifecycle);

    let err = game
        .propose_move(LoopMove::Start {}, PlayerIndex::seat(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DelegateBug);
    assert!(err.to_string().contains("cascade"), "{err}");

    // The player move and every fix-up up to the limit were committed.
    assert_eq!(game.version().unwrap(), 1001);
    assert_eq!(game.current_state().unwrap().game.ticks, 1000);

    match lifecycle.recv().await.unwrap() {
        Event::Game(GameEvent::Unhealthy { game_id, reason }) => {
            assert_eq!(&game_id, game.id());
            assert!(reason.contains("cascade"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    let err = game
        .propose_move(LoopMove::Start {}, PlayerIndex::seat(1))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Unhealthy(_)), "{err}");
    assert!(game.internals().force_fix_up().await.is_err());

    // A respawned worker still refuses writes.
    manager.shutdown().await.unwrap();
    let reopened = manager.game(game.id()).unwrap();
    let err = reopened
        .propose_move(LoopMove::Start {}, PlayerIndex::seat(1))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Unhealthy(_)), "{err}");
    assert_eq!(reopened.version().unwrap(), 1001);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_move_names_are_rejected() {
    struct Duplicated;

    impl RuleDelegate for Duplicated {
        type GameState = LoopState;
        type PlayerState = LoopPlayer;
        type Move = DupMove;

        fn name(&self) -> &str {
            "duplicated"
        }

        fn game_state_constructor(&self) -> LoopState {
            LoopState::default()
        }

        fn player_state_constructor(&self, _index: PlayerIndex) -> LoopPlayer {
            LoopPlayer::default()
        }

        fn configure_moves(&self) -> Vec<MoveConfig> {
            vec![
                MoveConfig::player("Start", "Start"),
                MoveConfig::fix_up("Start", "Start again"),
            ]
        }

        fn check_game_finished(&self, _state: &StateOf<Self>) -> (bool, Vec<PlayerIndex>) {
            (false, Vec::new())
        }

        fn propose_fix_up_move(
            &self,
            _state: &StateOf<Self>,
            _ctx: &GameContext<'_>,
        ) -> Option<DupMove> {
            None
        }
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(tag = "Name", content = "Blob")]
    enum DupMove {
        Start {},
    }

    impl GameMove<Duplicated> for DupMove {
        fn legal(
            &self,
            _state: &StateOf<Duplicated>,
            _proposer: PlayerIndex,
            _ctx: &GameContext<'_>,
        ) -> Result<(), IllegalMove> {
            Ok(())
        }

        fn apply(
            &self,
            _state: &mut StateOf<Duplicated>,
            _ctx: &mut MoveContext<'_, DupMove>,
        ) -> Result<(), ApplyError> {
            Ok(())
        }
    }

    let err = GameManager::new(Duplicated, Arc::new(InMemoryGameRepo::new()))
        .err()
        .unwrap();
    assert!(matches!(err, RuntimeError::InvalidConfig(_)), "{err}");
}
