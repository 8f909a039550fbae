//! Game manager that owns the rule set, the repository and one worker per
//! live game.
//!
//! Workers are spawned lazily: [`GameManager::game`] starts a worker for a
//! stored game the first time it is asked for, so games survive a manager
//! restart as long as the repository does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use game_core::{
    GameContext, GameEngine, GameId, GameRecord, MoveKind, MoveRecord, RuleDelegate,
    StateSnapshot, Variant, inflate_move,
};

use crate::api::{Game, Result, RuntimeError};
use crate::config::RuntimeConfig;
use crate::events::{Event, EventBus, GameEvent, Topic};
use crate::repository::{GameRepository, Mailbox, WILL_SEAT_PLAYER};
use crate::workers::{Command, GameWorker, WorkerSettings};

const GAME_ID_LEN: usize = 16;
const SALT_LEN: usize = 16;

struct WorkerSlot<D: RuleDelegate> {
    command_tx: mpsc::Sender<Command<D::Move>>,
    join: JoinHandle<()>,
}

/// Entry point for creating and opening games of one rule set.
pub struct GameManager<D: RuleDelegate> {
    delegate: Arc<D>,
    repo: Arc<dyn GameRepository>,
    config: RuntimeConfig,
    event_bus: EventBus,
    move_kinds: Arc<HashMap<String, MoveKind>>,
    workers: Mutex<HashMap<GameId, WorkerSlot<D>>>,
    /// Reason a game was declared unhealthy. Outlives its worker, so a
    /// respawned worker keeps refusing writes.
    health: Mutex<HashMap<GameId, Arc<OnceLock<String>>>>,
}

impl<D: RuleDelegate> GameManager<D> {
    /// Create a manager with the default [`RuntimeConfig`].
    pub fn new(delegate: D, repo: Arc<dyn GameRepository>) -> Result<Self> {
        Self::builder(delegate, repo).build()
    }

    pub fn builder(delegate: D, repo: Arc<dyn GameRepository>) -> GameManagerBuilder<D> {
        GameManagerBuilder {
            delegate,
            repo,
            config: RuntimeConfig::default(),
        }
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn repository(&self) -> &Arc<dyn GameRepository> {
        &self.repo
    }

    /// Injected-data mailbox of the repository.
    pub fn mailbox(&self) -> &Mailbox {
        self.repo.mailbox()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    pub fn list_games(&self) -> Result<Vec<GameId>> {
        self.repo.list_games().map_err(RuntimeError::from_repository)
    }

    /// Sets up and persists a new game, then runs its first fix-up cascade.
    ///
    /// `num_players` falls back to the rule set's default; `agents` is padded
    /// or truncated to one entry per seat.
    pub async fn new_game(
        &self,
        num_players: Option<usize>,
        variant: &Variant,
        agents: Vec<Option<String>>,
    ) -> Result<Game<D>> {
        self.create_game(
            random_game_id(),
            random_salt(),
            num_players,
            variant,
            agents,
            Utc::now(),
        )
        .await
    }

    /// Opens a stored game, spawning its worker if none is running.
    pub fn game(&self, id: &GameId) -> Result<Game<D>> {
        let mut workers = self.workers.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        if let Some(slot) = workers.get(id)
            && !slot.join.is_finished()
        {
            return Ok(self.handle(id.clone(), slot.command_tx.clone()));
        }

        let record = self.repo.game(id).map_err(RuntimeError::from_repository)?;
        if record.name != self.delegate.name() {
            return Err(RuntimeError::DelegateMismatch {
                game_id: id.clone(),
                expected: self.delegate.name().to_string(),
                found: record.name,
            });
        }

        let unhealthy = self
            .health
            .lock()
            .map_err(|_| RuntimeError::LockPoisoned)?
            .entry(id.clone())
            .or_default()
            .clone();

        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer_size);
        let worker = GameWorker::new(
            id.clone(),
            Arc::clone(&self.delegate),
            Arc::clone(&self.repo),
            self.event_bus.clone(),
            command_rx,
            WorkerSettings {
                move_kinds: Arc::clone(&self.move_kinds),
                max_fix_up_cascade: self.config.max_fix_up_cascade,
            },
            unhealthy,
        );
        let join = tokio::spawn(worker.run());
        debug!(target: "runtime::manager", game_id = %id, "spawned game worker");

        workers.insert(
            id.clone(),
            WorkerSlot {
                command_tx: command_tx.clone(),
                join,
            },
        );
        Ok(self.handle(id.clone(), command_tx))
    }

    /// Privileged operations used by tooling such as the golden comparer.
    pub fn internals(&self) -> ManagerInternals<'_, D> {
        ManagerInternals { manager: self }
    }

    /// Stops every worker and waits for them to exit.
    ///
    /// Handles obtained earlier fail with
    /// [`RuntimeError::CommandChannelClosed`] afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        let slots: Vec<(GameId, WorkerSlot<D>)> = {
            let mut workers = self.workers.lock().map_err(|_| RuntimeError::LockPoisoned)?;
            workers.drain().collect()
        };

        for (id, slot) in slots {
            if slot.command_tx.send(Command::Shutdown).await.is_err() {
                debug!(target: "runtime::manager", game_id = %id, "worker already stopped");
            }
            slot.join.await.map_err(RuntimeError::WorkerJoin)?;
        }
        info!(target: "runtime::manager", "all game workers stopped");
        Ok(())
    }

    fn handle(&self, id: GameId, command_tx: mpsc::Sender<Command<D::Move>>) -> Game<D> {
        Game::new(
            id,
            command_tx,
            Arc::clone(&self.repo),
            Arc::clone(&self.delegate),
            self.event_bus.clone(),
            self.config.proposal_timeout(),
        )
    }

    async fn create_game(
        &self,
        id: GameId,
        secret_salt: String,
        num_players: Option<usize>,
        variant: &Variant,
        mut agents: Vec<Option<String>>,
        created: DateTime<Utc>,
    ) -> Result<Game<D>> {
        let engine = GameEngine::new(&*self.delegate);
        let (num_players, variant) = engine.resolve_config(num_players, variant)?;
        agents.truncate(num_players);
        agents.resize(num_players, None);

        let mut record = GameRecord {
            name: self.delegate.name().to_string(),
            id: id.clone(),
            secret_salt,
            version: 0,
            winners: Vec::new(),
            finished: false,
            num_players,
            agents,
            variant,
            created,
            modified: created,
        };

        let will_seat_player = self
            .repo
            .fetch_injected_data_for_game(&id, WILL_SEAT_PLAYER)
            .is_some_and(|data| data.is_set());
        let ctx = GameContext {
            game_id: &id,
            num_players,
            variant: &record.variant,
            version: 0,
            will_seat_player,
        };
        let state = engine.setup(&ctx, &record.salt_bytes())?;
        let blob = engine
            .verify_round_trip(&state)
            .map_err(|err| RuntimeError::DelegateBug {
                game_id: id.clone(),
                message: format!("initial state does not round-trip: {err}"),
            })?;

        let (finished, winners) = self.delegate.check_game_finished(&state);
        if finished {
            record.finished = true;
            record.winners = winners;
        }

        self.repo
            .save_game_and_current_state(&record, &StateSnapshot::new(id.clone(), 0, blob), None)
            .map_err(RuntimeError::from_repository)?;
        info!(
            target: "runtime::manager",
            game_id = %id,
            name = %record.name,
            num_players,
            "created game"
        );
        self.event_bus.publish(GameEvent::Created {
            game_id: id.clone(),
            name: record.name,
        });

        let game = self.game(&id)?;
        game.internals().force_fix_up().await?;
        Ok(game)
    }
}

/// Builder for [`GameManager`].
pub struct GameManagerBuilder<D: RuleDelegate> {
    delegate: D,
    repo: Arc<dyn GameRepository>,
    config: RuntimeConfig,
}

impl<D: RuleDelegate> GameManagerBuilder<D> {
    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<GameManager<D>> {
        self.config
            .validate()
            .map_err(|err| RuntimeError::InvalidConfig(err.to_string()))?;

        let mut move_kinds = HashMap::new();
        for config in self.delegate.configure_moves() {
            if move_kinds.insert(config.name.clone(), config.kind).is_some() {
                return Err(RuntimeError::InvalidConfig(format!(
                    "rule set {} declares move {} twice",
                    self.delegate.name(),
                    config.name
                )));
            }
        }

        Ok(GameManager {
            delegate: Arc::new(self.delegate),
            repo: self.repo,
            event_bus: EventBus::with_capacity(self.config.event_buffer_size),
            config: self.config,
            move_kinds: Arc::new(move_kinds),
            workers: Mutex::new(HashMap::new()),
            health: Mutex::new(HashMap::new()),
        })
    }
}

/// Privileged manager operations.
pub struct ManagerInternals<'a, D: RuleDelegate> {
    manager: &'a GameManager<D>,
}

impl<D: RuleDelegate> ManagerInternals<'_, D> {
    /// Creates a game with the identity and configuration of `record`
    /// (id, salt, seats, variant, agents), so replaying its moves reproduces
    /// the same states.
    pub async fn recreate_game(&self, record: &GameRecord) -> Result<Game<D>> {
        let manager = self.manager;
        if record.name != manager.delegate.name() {
            return Err(RuntimeError::DelegateMismatch {
                game_id: record.id.clone(),
                expected: manager.delegate.name().to_string(),
                found: record.name.clone(),
            });
        }
        manager
            .create_game(
                record.id.clone(),
                record.secret_salt.clone(),
                Some(record.num_players),
                &record.variant,
                record.agents.clone(),
                record.created,
            )
            .await
    }

    /// Rebuilds the typed move stored in `record`.
    pub fn inflate_move_record(&self, record: &MoveRecord) -> Result<D::Move> {
        Ok(inflate_move(&record.name, &record.blob)?)
    }
}

fn random_game_id() -> GameId {
    let id: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GAME_ID_LEN)
        .map(char::from)
        .collect();
    GameId::new(id)
}

fn random_salt() -> String {
    hex::encode(rand::random::<[u8; SALT_LEN]>())
}
