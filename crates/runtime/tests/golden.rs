mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use game_content::pig::TURN_TIMER;
use game_content::{Pig, PigMove};
use game_core::{PlayerIndex, Variant};
use runtime::{
    ErrorKind, FileGameRepository, GameRepository, GoldenComparer, InjectedData, Record,
    WILL_SEAT_PLAYER, compare_golden, remaster_golden,
};
use serde_json::Value;
use tempfile::TempDir;

use common::{bot_move, file_manager, init_tracing, new_pig_game, play_until};

/// Plays a scripted two-player Pig game into `dir` and returns the path of
/// its record file.
async fn record_golden(dir: &Path, min_version: u64) -> PathBuf {
    let repo = Arc::new(FileGameRepository::new(dir).unwrap());
    let manager = file_manager(repo.clone());
    let game = new_pig_game(&manager, &Variant::new()).await;
    play_until(&game, min_version).await;
    manager.shutdown().await.unwrap();
    repo.record_path(game.id())
}

#[tokio::test]
async fn test_compare_replays_recorded_game() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = record_golden(dir.path(), 10).await;
    let golden_version = Record::load(&path).unwrap().game().version;
    assert!(golden_version >= 10);

    let verified = compare_golden(Pig, &path).await.unwrap();
    assert_eq!(verified, golden_version);
}

#[tokio::test]
async fn test_altered_blob_is_reported_at_its_version() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = record_golden(dir.path(), 10).await;

    let mut file: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    file["Moves"][4]["Blob"]["Altered"] = Value::Bool(true);
    fs::write(&path, serde_json::to_string_pretty(&file).unwrap()).unwrap();

    let err = compare_golden(Pig, &path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Mismatch);
    assert_eq!(err.mismatch_version(), Some(5));
    let message = err.to_string();
    assert!(message.contains("version 5"), "{message}");
    assert!(message.contains("/Altered"), "{message}");
}

#[tokio::test]
async fn test_fix_up_past_end_of_golden_is_a_mismatch() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    // Twelve versions always include the end of the first turn.
    let path = record_golden(dir.path(), 12).await;

    // Cut the transcript right before its first FinishTurn.
    let mut file: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let moves = file["Moves"].as_array_mut().unwrap();
    let cut = moves
        .iter()
        .position(|mv| mv["Name"] == "FinishTurn")
        .expect("first turn ends within twelve versions");
    moves.truncate(cut);
    file["StatePatches"].as_array_mut().unwrap().truncate(cut + 1);
    file["Game"]["Version"] = Value::from(cut);
    fs::write(&path, serde_json::to_string_pretty(&file).unwrap()).unwrap();

    let err = compare_golden(Pig, &path).await.unwrap_err();
    assert_eq!(err.mismatch_version(), Some(cut as u64 + 1), "{err}");
    assert!(err.to_string().contains("past the end"), "{err}");
}

#[tokio::test]
async fn test_seat_move_is_reproduced_through_injected_signaler() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(FileGameRepository::new(dir.path()).unwrap());
    repo.mailbox()
        .deposit_default(WILL_SEAT_PLAYER, InjectedData::Flag(true));
    let manager = file_manager(repo.clone());
    let game = new_pig_game(&manager, &Variant::new()).await;
    assert!(!game.state(0).unwrap().players[1].seated);

    game.propose_move(PigMove::Roll {}, PlayerIndex::seat(0))
        .await
        .unwrap();
    manager
        .mailbox()
        .queue_seat(game.id(), PlayerIndex::seat(1));
    assert_eq!(game.internals().force_fix_up().await.unwrap(), 2);

    let seat = game.move_record(2).unwrap();
    assert_eq!(seat.name, "SeatPlayer");
    assert!(seat.proposer.is_admin());
    assert_eq!(seat.initiator, 2);
    assert!(manager.mailbox().pending_seats(game.id()).is_empty());

    play_until(&game, 8).await;
    manager.shutdown().await.unwrap();

    let golden = Record::load(repo.record_path(game.id())).unwrap();
    let last = golden.game().version;
    let mut comparer = GoldenComparer::new(Pig, golden).unwrap();
    comparer.compare().await.unwrap();
    assert_eq!(comparer.last_verified_version(), last);
    assert_eq!(comparer.seat_commits(), 1);
    comparer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_timer_move_is_reproduced_by_forcing_the_timer() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(FileGameRepository::new(dir.path()).unwrap());
    let manager = file_manager(repo.clone());
    let game = new_pig_game(&manager, &Variant::new().with(TURN_TIMER, "30s")).await;

    while game.current_state().unwrap().game.turn_count == 0 {
        bot_move(&game).await;
    }
    let before = game.version().unwrap();
    assert!(game.internals().force_next_timer().await.unwrap());
    play_until(&game, before + 6).await;
    manager.shutdown().await.unwrap();

    let path = repo.record_path(game.id());
    let golden = Record::load(&path).unwrap();
    let expired = golden.move_record(before + 1).unwrap();
    assert_eq!(expired.name, "TurnExpired");
    assert!(expired.proposer.is_admin());

    let verified = compare_golden(Pig, &path).await.unwrap();
    assert_eq!(verified, golden.game().version);
}

#[tokio::test]
async fn test_remaster_keeps_description_and_timestamps() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = record_golden(dir.path(), 10).await;

    let mut golden = Record::load(&path).unwrap();
    golden.set_description("two cautious players");
    golden.save(&path).unwrap();

    let remastered = remaster_golden(Pig, &path).await.unwrap();
    assert_eq!(remastered.description(), "two cautious players");
    assert_eq!(remastered.game().version, golden.game().version);
    assert_eq!(remastered.game().secret_salt, golden.game().secret_salt);

    let names = |record: &Record| -> Vec<String> {
        record.moves().iter().map(|mv| mv.name.clone()).collect()
    };
    assert_eq!(names(&remastered), names(&golden));
    for (new, old) in remastered.moves().iter().zip(golden.moves()) {
        assert_eq!(new.timestamp, old.timestamp);
        assert_eq!(new.initiator, old.initiator);
    }

    // The rewritten file is itself a valid golden.
    let reloaded = Record::load(&path).unwrap();
    assert_eq!(reloaded.description(), "two cautious players");
    assert_eq!(
        compare_golden(Pig, &path).await.unwrap(),
        golden.game().version
    );
}
