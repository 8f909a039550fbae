#![allow(dead_code)]

use std::sync::Arc;

use game_content::pig::bot;
use game_content::{Pig, PigMove};
use game_core::{PlayerIndex, Variant};
use runtime::{FileGameRepository, Game, GameManager, GameRepository, InMemoryGameRepo};
use tracing_subscriber::EnvFilter;

/// Round score the scripted players bank at.
pub const HOLD_AT: i64 = 10;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn pig_manager() -> GameManager<Pig> {
    GameManager::new(Pig, Arc::new(InMemoryGameRepo::new())).expect("default config is valid")
}

pub fn file_manager(repo: Arc<FileGameRepository>) -> GameManager<Pig> {
    let repo: Arc<dyn GameRepository> = repo;
    GameManager::new(Pig, repo).expect("default config is valid")
}

pub async fn new_pig_game(manager: &GameManager<Pig>, variant: &Variant) -> Game<Pig> {
    manager
        .new_game(Some(2), variant, Vec::new())
        .await
        .expect("pig game should be created")
}

/// Proposes one scripted move for whoever is to act.
pub async fn bot_move(game: &Game<Pig>) -> (PlayerIndex, PigMove, u64) {
    let state = game.current_state().expect("current state is readable");
    let (player, mv) = bot::hold_at(&state, HOLD_AT).expect("current player can act");
    let version = game
        .propose_move(mv.clone(), player)
        .await
        .expect("scripted move is legal");
    (player, mv, version)
}

/// Plays scripted moves until the game reaches `min_version` or finishes.
pub async fn play_until(game: &Game<Pig>, min_version: u64) -> u64 {
    loop {
        let version = game.version().expect("record is readable");
        if version >= min_version || game.finished().expect("record is readable") {
            return version;
        }
        bot_move(game).await;
    }
}
