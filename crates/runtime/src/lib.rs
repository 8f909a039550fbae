//! Runtime orchestration for deterministic turn-based games.
//!
//! This crate wires rule sets from `game-core` to persistent storage and a
//! per-game worker. Consumers create a [`GameManager`] for one rule set and a
//! repository, open [`Game`] handles, propose moves and subscribe to events.
//!
//! Modules are organized by responsibility:
//! - [`manager`] hosts the game manager and its builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] provides a topic-based event bus
//! - `workers` keeps the per-game tasks internal to the crate
//! - [`repository`], [`record`] and [`codec`] persist games and their history
//! - [`golden`] replays recorded transcripts as regression oracles
pub mod api;
pub mod codec;
pub mod config;
pub mod events;
pub mod golden;
pub mod manager;
pub mod record;
pub mod repository;

mod workers;

pub use api::{ErrorKind, Game, GameInternals, ProposalTicket, Result, RuntimeError};
pub use codec::{CodecError, Codecs, DiffEncoder, EncodingKind, FullEncoder, PatchEncoder};
pub use config::{ConfigError, RuntimeConfig};
pub use events::{Event, EventBus, GameEvent, ProposalEvent, Topic};
pub use golden::{GoldenComparer, GoldenError, compare_golden, remaster_golden};
pub use manager::{GameManager, GameManagerBuilder, ManagerInternals};
pub use record::Record;
pub use repository::{
    FileGameRepository, GameRepository, InMemoryGameRepo, InjectedData, Mailbox, PLAYER_TO_SEAT,
    RepositoryError, SeatSignaler, WILL_SEAT_PLAYER,
};
