//! Game worker that owns the write path of one game.
//!
//! Receives proposals from [`crate::Game`] handles, runs them through
//! [`game_core::GameEngine`], persists each resulting version, and keeps
//! applying admin moves (seat, fix-up, timer) until the rule set has nothing
//! more to do. Every write to a game happens on this task, one at a time.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use game_core::{
    ExecuteError, GameContext, GameEngine, GameId, GameRecord, MoveKind, MoveRecord, PlayerIndex,
    RuleDelegate, StateOf, StateRng, StateSnapshot, encode_move,
};

use crate::api::{Result, RuntimeError};
use crate::events::{EventBus, GameEvent, ProposalEvent};
use crate::repository::{
    GameRepository, PLAYER_TO_SEAT, RepositoryError, SeatSignaler, WILL_SEAT_PLAYER,
};

use super::timers::{TimerQueue, far_future};

/// A move submitted by a player, waiting in the queue.
pub(crate) struct Proposal<M> {
    pub mv: M,
    pub proposer: PlayerIndex,
    /// Proposals still queued at this instant are rejected with a timeout.
    pub deadline: Option<Instant>,
}

/// Commands that can be sent to the game worker.
pub(crate) enum Command<M> {
    /// Validate and apply a player move, then run the fix-up cascade.
    /// Replies with the version the game stands at afterwards.
    ProposeMove {
        proposal: Proposal<M>,
        reply: oneshot::Sender<Result<u64>>,
    },
    /// Run the fix-up cascade without a triggering move.
    ForceFixUp { reply: oneshot::Sender<Result<u64>> },
    /// Fire the earliest pending timer now. Replies false when none fired.
    ForceNextTimer { reply: oneshot::Sender<Result<bool>> },
    Shutdown,
}

/// Latest persisted version, decoded.
struct Head<D: RuleDelegate> {
    record: GameRecord,
    state: StateOf<D>,
}

enum AdminMove<M> {
    Seat(M, SeatSignaler),
    FixUp(M),
}

pub(crate) struct WorkerSettings {
    pub move_kinds: Arc<HashMap<String, MoveKind>>,
    pub max_fix_up_cascade: usize,
}

/// Background task that processes the commands of one game.
pub(crate) struct GameWorker<D: RuleDelegate> {
    id: GameId,
    delegate: Arc<D>,
    repo: Arc<dyn GameRepository>,
    event_bus: EventBus,
    command_rx: mpsc::Receiver<Command<D::Move>>,
    settings: WorkerSettings,
    timers: TimerQueue<D::Move>,
    /// Set once the rule set misbehaved; the game refuses further writes.
    /// Shared with the manager so it survives a worker restart.
    unhealthy: Arc<OnceLock<String>>,
}

impl<D: RuleDelegate> GameWorker<D> {
    pub(crate) fn new(
        id: GameId,
        delegate: Arc<D>,
        repo: Arc<dyn GameRepository>,
        event_bus: EventBus,
        command_rx: mpsc::Receiver<Command<D::Move>>,
        settings: WorkerSettings,
        unhealthy: Arc<OnceLock<String>>,
    ) -> Self {
        Self {
            id,
            delegate,
            repo,
            event_bus,
            command_rx,
            settings,
            timers: TimerQueue::new(),
            unhealthy,
        }
    }

    /// Main worker loop.
    pub(crate) async fn run(mut self) {
        debug!(target: "runtime::worker", game_id = %self.id, "worker started");
        loop {
            let next_timer = self.timers.next_deadline();
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                _ = sleep_until(next_timer.unwrap_or_else(far_future)), if next_timer.is_some() => {
                    if let Err(err) = self.fire_timer(Some(Instant::now())) {
                        warn!(
                            target: "runtime::worker",
                            game_id = %self.id,
                            error = %err,
                            "timer move failed"
                        );
                    }
                }
            }
        }
        debug!(
            target: "runtime::worker",
            game_id = %self.id,
            pending_timers = self.timers.len(),
            "worker stopped"
        );
    }

    fn handle_command(&mut self, cmd: Command<D::Move>) {
        match cmd {
            Command::ProposeMove { proposal, reply } => {
                let result = self.process_proposal(proposal);
                if reply.send(result).is_err() {
                    debug!(target: "runtime::worker", "ProposeMove reply channel closed (caller dropped)");
                }
            }
            Command::ForceFixUp { reply } => {
                let result = self.force_fix_up();
                if reply.send(result).is_err() {
                    debug!(target: "runtime::worker", "ForceFixUp reply channel closed (caller dropped)");
                }
            }
            Command::ForceNextTimer { reply } => {
                let result = self.fire_timer(None);
                if reply.send(result).is_err() {
                    debug!(target: "runtime::worker", "ForceNextTimer reply channel closed (caller dropped)");
                }
            }
            Command::Shutdown => {}
        }
    }

    fn process_proposal(&mut self, proposal: Proposal<D::Move>) -> Result<u64> {
        let Proposal {
            mv,
            proposer,
            deadline,
        } = proposal;

        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            debug!(target: "runtime::worker", game_id = %self.id, "proposal expired in queue");
            return Err(RuntimeError::Timeout);
        }
        self.ensure_healthy()?;

        let (name, _) = encode_move(&mv)?;
        let head = self.load_head()?;
        if let Err(reason) = self.validate_proposal(&head, &mv, &name, proposer) {
            return Err(self.reject(name, proposer, reason));
        }

        let head = self.commit(&head, &mv, proposer, None)?;
        let version = head.record.version;
        self.run_cascade(head, Some(version))
    }

    fn validate_proposal(
        &self,
        head: &Head<D>,
        mv: &D::Move,
        name: &str,
        proposer: PlayerIndex,
    ) -> std::result::Result<(), String> {
        if head.record.finished {
            return Err("game is finished".to_string());
        }
        match self.settings.move_kinds.get(name) {
            None => return Err(format!("unknown move {name}")),
            Some(kind) if *kind != MoveKind::Player => {
                return Err(format!("{name} is a {kind} move and cannot be proposed"));
            }
            Some(_) => {}
        }
        let ctx = context(&self.id, &head.record, self.will_seat_player());
        GameEngine::new(&*self.delegate)
            .check_legal(&head.state, mv, proposer, &ctx)
            .map_err(|err| match err {
                ExecuteError::Illegal { source, .. } => source.reason,
                other => other.to_string(),
            })
    }

    fn reject(&self, name: String, proposer: PlayerIndex, reason: String) -> RuntimeError {
        debug!(
            target: "runtime::worker",
            game_id = %self.id,
            %name,
            %proposer,
            %reason,
            "rejected proposal"
        );
        self.event_bus.publish(ProposalEvent::Rejected {
            game_id: self.id.clone(),
            name: name.clone(),
            proposer,
            reason: reason.clone(),
        });
        RuntimeError::IllegalMove { name, reason }
    }

    fn force_fix_up(&mut self) -> Result<u64> {
        self.ensure_healthy()?;
        let head = self.load_head()?;
        self.run_cascade(head, None)
    }

    /// Fires the earliest timer whose move is still legal.
    ///
    /// With `due_at`, only timers whose deadline has passed are considered.
    /// Timers that are no longer legal are dropped.
    fn fire_timer(&mut self, due_at: Option<Instant>) -> Result<bool> {
        self.ensure_healthy()?;
        while let Some(mv) = self.timers.pop(due_at) {
            let head = self.load_head()?;
            if head.record.finished {
                self.timers.clear();
                return Ok(false);
            }

            let id = self.id.clone();
            let ctx = context(&id, &head.record, self.will_seat_player());
            if let Err(err) =
                GameEngine::new(&*self.delegate).check_legal(&head.state, &mv, PlayerIndex::ADMIN, &ctx)
            {
                debug!(target: "runtime::worker", game_id = %id, error = %err, "dropping stale timer");
                continue;
            }

            let head = self
                .commit(&head, &mv, PlayerIndex::ADMIN, None)
                .map_err(|err| self.escalate(err))?;
            let version = head.record.version;
            self.run_cascade(head, Some(version))?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Applies seat and fix-up moves until the rule set proposes nothing.
    ///
    /// Fix-ups are attributed to `initiator`; without one, the first fix-up
    /// starts its own chain. Returns the final version.
    fn run_cascade(&mut self, mut head: Head<D>, mut initiator: Option<u64>) -> Result<u64> {
        let delegate = Arc::clone(&self.delegate);
        let engine = GameEngine::new(&*delegate);
        let id = self.id.clone();
        let mut steps = 0usize;

        while !head.record.finished {
            let ctx = context(&id, &head.record, self.will_seat_player());
            let next = match self.next_admin_move(&engine, &head, &ctx) {
                Ok(Some(next)) => next,
                Ok(None) => break,
                Err(message) => return Err(self.delegate_bug(message)),
            };

            steps += 1;
            if steps > self.settings.max_fix_up_cascade {
                let limit = self.settings.max_fix_up_cascade;
                return Err(self.delegate_bug(format!("fix-up cascade exceeded {limit} moves")));
            }

            head = match next {
                AdminMove::Seat(mv, signaler) => {
                    let seated = self
                        .commit(&head, &mv, PlayerIndex::ADMIN, None)
                        .map_err(|err| self.escalate(err))?;
                    signaler.committed();
                    info!(
                        target: "runtime::worker",
                        game_id = %id,
                        seat = %signaler.seat(),
                        version = seated.record.version,
                        "seated player"
                    );
                    initiator = Some(seated.record.version);
                    seated
                }
                AdminMove::FixUp(mv) => {
                    let fixed = self
                        .commit(&head, &mv, PlayerIndex::ADMIN, initiator)
                        .map_err(|err| self.escalate(err))?;
                    initiator.get_or_insert(fixed.record.version);
                    fixed
                }
            };
        }
        Ok(head.record.version)
    }

    fn next_admin_move(
        &self,
        engine: &GameEngine<'_, D>,
        head: &Head<D>,
        ctx: &GameContext<'_>,
    ) -> std::result::Result<Option<AdminMove<D::Move>>, String> {
        while let Some(signaler) = self.pending_seat() {
            match self.delegate.seat_player_move(&head.state, signaler.seat(), ctx) {
                Some(mv) => match engine.check_legal(&head.state, &mv, PlayerIndex::ADMIN, ctx) {
                    Ok(()) => return Ok(Some(AdminMove::Seat(mv, signaler))),
                    Err(err) => debug!(
                        target: "runtime::worker",
                        game_id = %self.id,
                        seat = %signaler.seat(),
                        error = %err,
                        "seat move not legal; dropping seat"
                    ),
                },
                None => debug!(
                    target: "runtime::worker",
                    game_id = %self.id,
                    seat = %signaler.seat(),
                    "rule set does not seat players; dropping seat"
                ),
            }
            if !signaler.rejected() {
                break;
            }
        }

        let Some(mv) = self.delegate.propose_fix_up_move(&head.state, ctx) else {
            return Ok(None);
        };
        engine
            .check_legal(&head.state, &mv, PlayerIndex::ADMIN, ctx)
            .map_err(|err| format!("proposed fix-up is not legal: {err}"))?;
        Ok(Some(AdminMove::FixUp(mv)))
    }

    /// Applies `mv` on top of `head` and persists the result.
    fn commit(
        &mut self,
        head: &Head<D>,
        mv: &D::Move,
        proposer: PlayerIndex,
        initiator: Option<u64>,
    ) -> Result<Head<D>> {
        let delegate = Arc::clone(&self.delegate);
        let engine = GameEngine::new(&*delegate);
        let id = self.id.clone();
        let version = head.record.version + 1;

        let ctx = context(&id, &head.record, self.will_seat_player());
        let rng = StateRng::for_version(&head.record.salt_bytes(), version);
        let transition = engine
            .apply(&head.state, mv, ctx, rng)
            .map_err(RuntimeError::MoveFailed)?;
        let blob = match engine.verify_round_trip(&transition.state) {
            Ok(blob) => blob,
            Err(err) => {
                return Err(self.delegate_bug(format!(
                    "state after {} does not round-trip: {err}",
                    transition.name
                )));
            }
        };

        let (finished, winners) = delegate.check_game_finished(&transition.state);
        let now = Utc::now();
        let record = GameRecord {
            version,
            finished,
            winners: if finished { winners } else { Vec::new() },
            modified: now,
            ..head.record.clone()
        };
        let move_record = MoveRecord {
            name: transition.name,
            version,
            initiator: initiator.unwrap_or(version),
            phase: delegate.phase(&transition.state),
            proposer,
            timestamp: now,
            blob: transition.blob,
        };
        self.repo
            .save_game_and_current_state(
                &record,
                &StateSnapshot::new(id.clone(), version, blob),
                Some(&move_record),
            )
            .map_err(RuntimeError::from_repository)?;

        debug!(
            target: "runtime::worker",
            game_id = %id,
            version,
            name = %move_record.name,
            %proposer,
            initiator = move_record.initiator,
            "committed move"
        );

        self.timers.schedule(transition.timers, Instant::now());
        self.event_bus.publish(GameEvent::VersionChanged {
            game_id: id.clone(),
            version,
        });
        if finished {
            info!(
                target: "runtime::worker",
                game_id = %id,
                version,
                winners = ?record.winners,
                "game finished"
            );
            self.timers.clear();
            self.event_bus.publish(GameEvent::Finished {
                game_id: id,
                version,
                winners: record.winners.clone(),
            });
        }

        Ok(Head {
            record,
            state: transition.state,
        })
    }

    fn load_head(&self) -> Result<Head<D>> {
        let record = self
            .repo
            .game(&self.id)
            .map_err(RuntimeError::from_repository)?;
        let snapshot = self
            .repo
            .state(&self.id, record.version)
            .map_err(RuntimeError::from_repository)?;
        let state = serde_json::from_value(snapshot.blob)
            .map_err(|err| RuntimeError::Repository(RepositoryError::Json(err)))?;
        Ok(Head { record, state })
    }

    /// Admin moves that fail to apply mean the rule set lied about legality.
    fn escalate(&mut self, err: RuntimeError) -> RuntimeError {
        match err {
            RuntimeError::MoveFailed(source) => {
                self.delegate_bug(format!("admin move failed to apply: {source}"))
            }
            other => other,
        }
    }

    fn delegate_bug(&mut self, message: String) -> RuntimeError {
        error!(
            target: "runtime::worker",
            game_id = %self.id,
            %message,
            "rule set bug; game marked unhealthy"
        );
        self.timers.clear();
        let _ = self.unhealthy.set(message.clone());
        self.event_bus.publish(GameEvent::Unhealthy {
            game_id: self.id.clone(),
            reason: message.clone(),
        });
        RuntimeError::DelegateBug {
            game_id: self.id.clone(),
            message,
        }
    }

    fn ensure_healthy(&self) -> Result<()> {
        match self.unhealthy.get() {
            Some(_) => Err(RuntimeError::Unhealthy(self.id.clone())),
            None => Ok(()),
        }
    }

    fn will_seat_player(&self) -> bool {
        self.repo
            .fetch_injected_data_for_game(&self.id, WILL_SEAT_PLAYER)
            .is_some_and(|data| data.is_set())
    }

    fn pending_seat(&self) -> Option<SeatSignaler> {
        self.repo
            .fetch_injected_data_for_game(&self.id, PLAYER_TO_SEAT)
            .and_then(|data| data.as_seat().cloned())
    }
}

fn context<'a>(id: &'a GameId, record: &'a GameRecord, will_seat_player: bool) -> GameContext<'a> {
    GameContext {
        game_id: id,
        num_players: record.num_players,
        variant: &record.variant,
        version: record.version,
        will_seat_player,
    }
}
