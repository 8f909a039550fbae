//! Cloneable façade for one game.
//!
//! [`Game`] hides channel plumbing: writes are queued to the game's worker,
//! reads go straight to the repository and always observe a committed
//! version.
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use game_core::{
    GameId, GameRecord, MoveRecord, PlayerIndex, RuleDelegate, StateOf, sanitize_state,
};

use super::errors::{Result, RuntimeError};
use super::ticket::ProposalTicket;
use crate::events::{Event, EventBus, Topic};
use crate::repository::{GameRepository, RepositoryError};
use crate::workers::{Command, Proposal};

/// Client-facing handle to one game.
pub struct Game<D: RuleDelegate> {
    id: GameId,
    command_tx: mpsc::Sender<Command<D::Move>>,
    repo: Arc<dyn GameRepository>,
    delegate: Arc<D>,
    event_bus: EventBus,
    default_timeout: Option<Duration>,
}

impl<D: RuleDelegate> Clone for Game<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            command_tx: self.command_tx.clone(),
            repo: Arc::clone(&self.repo),
            delegate: Arc::clone(&self.delegate),
            event_bus: self.event_bus.clone(),
            default_timeout: self.default_timeout,
        }
    }
}

impl<D: RuleDelegate> Game<D> {
    pub(crate) fn new(
        id: GameId,
        command_tx: mpsc::Sender<Command<D::Move>>,
        repo: Arc<dyn GameRepository>,
        delegate: Arc<D>,
        event_bus: EventBus,
        default_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            command_tx,
            repo,
            delegate,
            event_bus,
            default_timeout,
        }
    }

    pub fn id(&self) -> &GameId {
        &self.id
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn record(&self) -> Result<GameRecord> {
        self.repo
            .game(&self.id)
            .map_err(RuntimeError::from_repository)
    }

    pub fn version(&self) -> Result<u64> {
        Ok(self.record()?.version)
    }

    pub fn finished(&self) -> Result<bool> {
        Ok(self.record()?.finished)
    }

    pub fn winners(&self) -> Result<Vec<PlayerIndex>> {
        Ok(self.record()?.winners)
    }

    /// Serialized state at `version`.
    pub fn state_json(&self, version: u64) -> Result<Value> {
        self.repo
            .state(&self.id, version)
            .map(|snapshot| snapshot.blob)
            .map_err(RuntimeError::from_repository)
    }

    /// Typed state at `version`.
    pub fn state(&self, version: u64) -> Result<StateOf<D>> {
        let blob = self.state_json(version)?;
        serde_json::from_value(blob)
            .map_err(|err| RuntimeError::Repository(RepositoryError::Json(err)))
    }

    pub fn current_state(&self) -> Result<StateOf<D>> {
        self.state(self.version()?)
    }

    /// The move that produced `version`.
    pub fn move_record(&self, version: u64) -> Result<MoveRecord> {
        self.repo
            .move_record(&self.id, version)
            .map_err(RuntimeError::from_repository)
    }

    /// Moves `1..=version`.
    pub fn move_records(&self, version: u64) -> Result<Vec<MoveRecord>> {
        self.repo
            .moves(&self.id, version)
            .map_err(RuntimeError::from_repository)
    }

    /// State at `version` as `player` may see it.
    pub fn json_for_player(&self, player: PlayerIndex, version: u64) -> Result<Value> {
        let record = self.record()?;
        let state = self.state_json(version)?;
        Ok(sanitize_state(
            &state,
            &self.delegate.sanitization_rules(),
            player,
            &record.salt_bytes(),
        ))
    }

    /// Queues a move and returns a ticket resolving to the version the game
    /// reached after the move and its fix-ups.
    ///
    /// Submission order is fixed once this returns.
    pub async fn submit_move(&self, mv: D::Move, proposer: PlayerIndex) -> Result<ProposalTicket> {
        let deadline = self.default_timeout.map(|timeout| Instant::now() + timeout);
        self.submit(mv, proposer, deadline).await
    }

    /// Proposes a move and waits for it to be applied or rejected.
    pub async fn propose_move(&self, mv: D::Move, proposer: PlayerIndex) -> Result<u64> {
        self.submit_move(mv, proposer).await?.await
    }

    /// Like [`Self::propose_move`], but the proposal is dropped with
    /// [`RuntimeError::Timeout`] if the worker has not started on it by
    /// `deadline`.
    pub async fn propose_move_with_deadline(
        &self,
        mv: D::Move,
        proposer: PlayerIndex,
        deadline: Instant,
    ) -> Result<u64> {
        self.submit(mv, proposer, Some(deadline)).await?.await
    }

    async fn submit(
        &self,
        mv: D::Move,
        proposer: PlayerIndex,
        deadline: Option<Instant>,
    ) -> Result<ProposalTicket> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(Command::ProposeMove {
                proposal: Proposal {
                    mv,
                    proposer,
                    deadline,
                },
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        Ok(ProposalTicket::new(reply_rx))
    }

    /// Subscribe to events from a specific topic.
    ///
    /// The bus is shared by every game of the manager; filter on `game_id`.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Privileged operations used by tooling such as the golden comparer.
    pub fn internals(&self) -> GameInternals<'_, D> {
        GameInternals { game: self }
    }
}

/// Privileged per-game operations.
pub struct GameInternals<'a, D: RuleDelegate> {
    game: &'a Game<D>,
}

impl<D: RuleDelegate> GameInternals<'_, D> {
    /// Runs the fix-up cascade (including pending seat moves) now.
    pub async fn force_fix_up(&self) -> Result<u64> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.game
            .command_tx
            .send(Command::ForceFixUp { reply: reply_tx })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }

    /// Fires the earliest pending timer without waiting for its deadline.
    /// Returns false when no timer was applied.
    pub async fn force_next_timer(&self) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.game
            .command_tx
            .send(Command::ForceNextTimer { reply: reply_tx })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
    }
}
