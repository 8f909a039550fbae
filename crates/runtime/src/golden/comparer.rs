//! Replays a golden transcript against a fresh engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use game_core::{GameMove, GameRecord, MoveKind, MoveRecord, PlayerIndex, RuleDelegate};

use super::align::align_timestamps;
use super::compare::{compare_json_blobs, compare_move_records, json_diff};
use super::errors::GoldenError;
use crate::api::{ErrorKind, Game};
use crate::codec::Codecs;
use crate::manager::GameManager;
use crate::record::Record;
use crate::repository::{GameRepository, InMemoryGameRepo, PLAYER_TO_SEAT};

type Result<T> = std::result::Result<T, GoldenError>;

/// Plays an engine through a golden transcript.
///
/// The engine runs on a private in-memory repository, recreated from the
/// golden's game record so that ids, salts and therefore every random draw
/// line up with the transcript.
pub struct GoldenComparer<D: RuleDelegate> {
    golden: Record,
    manager: GameManager<D>,
    move_kinds: HashMap<String, MoveKind>,
    game: Option<Game<D>>,
    last_verified_version: u64,
    /// Log lines of the current turn only.
    debug_log: Vec<String>,
    seat_commits: Arc<AtomicUsize>,
}

impl<D: RuleDelegate> GoldenComparer<D> {
    pub fn new(delegate: D, golden: Record) -> Result<Self> {
        if golden.game().name != delegate.name() {
            return Err(GoldenError::Transcript(format!(
                "golden belongs to rule set {:?}, not {:?}",
                golden.game().name,
                delegate.name()
            )));
        }
        if golden.last_version().is_none() {
            return Err(GoldenError::Transcript("golden has no states".to_string()));
        }

        let move_kinds: HashMap<String, MoveKind> = delegate
            .configure_moves()
            .into_iter()
            .map(|config| (config.name, config.kind))
            .collect();

        let repo = InMemoryGameRepo::new();
        let seats = golden
            .moves()
            .iter()
            .any(|mv| move_kinds.get(&mv.name) == Some(&MoveKind::SeatPlayer));
        if seats {
            repo.mailbox().mark_will_seat(&golden.game().id);
        }

        let manager = GameManager::new(delegate, Arc::new(repo))?;
        Ok(Self {
            golden,
            manager,
            move_kinds,
            game: None,
            last_verified_version: 0,
            debug_log: Vec::new(),
            seat_commits: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn golden(&self) -> &Record {
        &self.golden
    }

    pub fn manager(&self) -> &GameManager<D> {
        &self.manager
    }

    /// Highest version confirmed equal to the transcript.
    pub fn last_verified_version(&self) -> u64 {
        self.last_verified_version
    }

    /// How many injected seat signalers were committed.
    pub fn seat_commits(&self) -> usize {
        self.seat_commits.load(Ordering::SeqCst)
    }

    pub fn debug_log(&self) -> &[String] {
        &self.debug_log
    }

    /// Plays the whole transcript and fails on the first divergence.
    pub async fn compare(&mut self) -> Result<()> {
        self.start().await?;
        self.verify_initial_state()?;

        loop {
            if self.game()?.finished()? {
                break;
            }
            self.verify_unverified_moves()?;
            self.reset_debug_log();
            if !self.apply_next_move().await? {
                break;
            }
        }
        self.verify_unverified_moves()?;
        self.check_transcript_exhausted()?;
        self.compare_finished()?;

        info!(
            target: "runtime::golden",
            game_id = %self.golden.game().id,
            version = self.last_verified_version,
            "golden matches"
        );
        Ok(())
    }

    /// Replays only the initiator moves of the transcript, lets the rule set
    /// derive every fix-up afresh, and returns the resulting transcript with
    /// golden timestamps carried over where moves still align.
    pub async fn remaster(&mut self) -> Result<Record> {
        self.start().await?;

        let mut cursor = 0;
        while let Some(version) = self.advance_to_next_initiator_move(cursor) {
            if self.game()?.finished()? {
                warn!(
                    target: "runtime::golden",
                    version,
                    "engine finished before the golden ran out of moves"
                );
                break;
            }
            self.reset_debug_log();
            let Some(expected) = self.golden.move_record(version).cloned() else {
                break;
            };
            if !self.apply_next_special_admin_move(&expected).await? {
                self.apply_next_player_move(&expected).await?;
            }
            cursor = version;
        }

        let game = self.game()?.clone();
        let record = game.record()?;
        let mut moves = game.move_records(record.version)?;
        align_timestamps(&mut moves, self.golden.moves());
        let states = (0..=record.version)
            .map(|version| game.state_json(version))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let modified = moves
            .last()
            .map_or(self.golden.game().modified, |mv| mv.timestamp);
        let remastered = Record::build(
            self.golden.description(),
            GameRecord { modified, ..record },
            states,
            moves,
            Codecs::default(),
        )?;
        info!(
            target: "runtime::golden",
            game_id = %remastered.game().id,
            old_version = self.golden.game().version,
            new_version = remastered.game().version,
            "remastered golden"
        );
        Ok(remastered)
    }

    /// Recreates the golden's game in the private repository.
    pub async fn start(&mut self) -> Result<()> {
        let game = self
            .manager
            .internals()
            .recreate_game(self.golden.game())
            .await?;
        self.game = Some(game);
        self.last_verified_version = 0;
        self.reset_debug_log();
        Ok(())
    }

    /// Compares every engine version past the last verified one with the
    /// transcript.
    pub fn verify_unverified_moves(&mut self) -> Result<()> {
        let game = self.game()?.clone();
        let engine_version = game.version()?;

        while self.last_verified_version < engine_version {
            let version = self.last_verified_version + 1;
            let actual = game.move_record(version)?;
            let Some(expected) = self.golden.move_record(version) else {
                let actual_json = serde_json::to_value(&actual).unwrap_or_default();
                return Err(self.mismatch(
                    version,
                    format!("engine produced {} past the end of the golden", actual.name),
                    json_diff(&Value::Null, &actual_json),
                ));
            };
            if let Err(divergence) = compare_move_records(&actual, expected, false) {
                return Err(self.mismatch(version, divergence.what, divergence.diff));
            }

            let expected_state = self.golden.state(version)?.ok_or_else(|| {
                GoldenError::Transcript(format!("golden has no state for version {version}"))
            })?;
            let actual_state = game.state_json(version)?;
            if let Err(diff) = compare_json_blobs(&actual_state, &expected_state) {
                return Err(self.mismatch(version, "state differs", diff));
            }

            self.last_verified_version = version;
            debug!(target: "runtime::golden", version, name = %actual.name, "verified version");
        }
        Ok(())
    }

    /// Applies the transcript move right after the last verified version.
    /// Returns false once the transcript is exhausted.
    pub async fn apply_next_move(&mut self) -> Result<bool> {
        let version = self.last_verified_version + 1;
        let Some(expected) = self.golden.move_record(version).cloned() else {
            return Ok(false);
        };
        if !self.apply_next_special_admin_move(&expected).await? {
            self.apply_next_player_move(&expected).await?;
        }
        Ok(true)
    }

    /// Reproduces a seat or timer move. Returns false when `expected` is
    /// not an admin move.
    pub async fn apply_next_special_admin_move(&mut self, expected: &MoveRecord) -> Result<bool> {
        if !expected.proposer.is_admin() {
            return Ok(false);
        }
        let game = self.game()?.clone();
        let before = game.version()?;
        let mv = self.manager.internals().inflate_move_record(expected)?;

        if let Some(seat) = mv.seat_target() {
            self.log(format!("seating {seat} (golden version {})", expected.version));
            self.inject_seat(&game, seat);
            let result = game.internals().force_fix_up().await;
            self.manager.mailbox().take(game.id(), PLAYER_TO_SEAT);
            result?;
        } else if self.move_kinds.get(&expected.name) == Some(&MoveKind::Timer) {
            self.log(format!(
                "firing timer {} (golden version {})",
                expected.name, expected.version
            ));
            if !game.internals().force_next_timer().await? {
                return Err(self.mismatch(
                    expected.version,
                    format!("golden fires timer {} but none is pending", expected.name),
                    json_diff(&Value::Null, &expected.blob),
                ));
            }
        } else {
            let expected_json = serde_json::to_value(expected).unwrap_or_default();
            return Err(self.mismatch(
                expected.version,
                format!("engine did not produce admin move {}", expected.name),
                json_diff(&Value::Null, &expected_json),
            ));
        }

        if game.version()? <= before {
            return Err(self.mismatch(
                expected.version,
                format!("engine did not apply {}", expected.name),
                json_diff(&Value::Null, &expected.blob),
            ));
        }
        Ok(true)
    }

    /// Proposes the transcript's player move on behalf of its proposer.
    pub async fn apply_next_player_move(&mut self, expected: &MoveRecord) -> Result<()> {
        let game = self.game()?.clone();
        let mv = self.manager.internals().inflate_move_record(expected)?;
        self.log(format!(
            "proposing {} for {} (golden version {})",
            expected.name, expected.proposer, expected.version
        ));

        match game.propose_move(mv, expected.proposer).await {
            Ok(version) => {
                self.log(format!("engine at version {version}"));
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::IllegalMove => Err(self.mismatch(
                expected.version,
                format!("engine rejected {}: {err}", expected.name),
                json_diff(&Value::Null, &expected.blob),
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// Next transcript version after `after` that started its own causal
    /// chain and is not a fix-up the rule set would derive itself.
    pub fn advance_to_next_initiator_move(&self, after: u64) -> Option<u64> {
        self.golden
            .moves()
            .iter()
            .filter(|mv| mv.version > after && mv.is_initiator())
            .find(|mv| self.move_kinds.get(&mv.name) != Some(&MoveKind::FixUp))
            .map(|mv| mv.version)
    }

    /// The finished flag and winners must match the golden's game record.
    pub fn compare_finished(&self) -> Result<()> {
        let record = self.game()?.record()?;
        let golden = self.golden.game();
        if record.finished == golden.finished && record.winners == golden.winners {
            return Ok(());
        }
        let seats = |winners: &[PlayerIndex]| winners.iter().map(|p| p.0).collect::<Vec<_>>();
        let expected = json!({ "Finished": golden.finished, "Winners": seats(golden.winners.as_slice()) });
        let actual = json!({ "Finished": record.finished, "Winners": seats(record.winners.as_slice()) });
        Err(self.mismatch(
            record.version,
            "finished state differs",
            json_diff(&expected, &actual),
        ))
    }

    /// Shuts down the private manager.
    pub async fn shutdown(&self) -> Result<()> {
        Ok(self.manager.shutdown().await?)
    }

    fn verify_initial_state(&self) -> Result<()> {
        let expected = self
            .golden
            .state(0)?
            .ok_or_else(|| GoldenError::Transcript("golden has no initial state".to_string()))?;
        let actual = self.game()?.state_json(0)?;
        compare_json_blobs(&actual, &expected)
            .map_err(|diff| self.mismatch(0, "initial state differs", diff))
    }

    fn check_transcript_exhausted(&self) -> Result<()> {
        let next = self.last_verified_version + 1;
        match self.golden.move_record(next) {
            None => Ok(()),
            Some(expected) => {
                let expected_json = serde_json::to_value(expected).unwrap_or_default();
                Err(self.mismatch(
                    next,
                    format!("golden continues with {} but the engine stopped", expected.name),
                    json_diff(&expected_json, &Value::Null),
                ))
            }
        }
    }

    fn inject_seat(&self, game: &Game<D>, seat: PlayerIndex) {
        let commits = Arc::clone(&self.seat_commits);
        self.manager.mailbox().deposit_seat(game.id(), seat, move |_| {
            commits.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn game(&self) -> Result<&Game<D>> {
        self.game
            .as_ref()
            .ok_or_else(|| GoldenError::Transcript("comparer has not been started".to_string()))
    }

    fn reset_debug_log(&mut self) {
        self.debug_log.clear();
    }

    fn log(&mut self, line: String) {
        debug!(target: "runtime::golden", "{line}");
        self.debug_log.push(line);
    }

    fn mismatch(&self, version: u64, what: impl Into<String>, diff: String) -> GoldenError {
        let what = what.into();
        warn!(target: "runtime::golden", version, %what, "golden mismatch");
        GoldenError::Mismatch {
            version,
            what,
            diff,
            log: self.debug_log.join("\n"),
        }
    }
}
