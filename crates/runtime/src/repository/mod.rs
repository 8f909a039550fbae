//! Repository layer for game records, states, and moves.
//!
//! Repositories own every persisted byte. The engine reads through them
//! concurrently with the per-game worker and appends exclusively from that
//! worker. The injected-data mailbox rides along with each repository.

mod error;
mod file;
mod injected;
mod memory;
mod traits;

pub use error::{RepositoryError, Result};
pub use file::FileGameRepository;
pub use injected::{InjectedData, Mailbox, PLAYER_TO_SEAT, SeatSignaler, WILL_SEAT_PLAYER};
pub use memory::InMemoryGameRepo;
pub use traits::GameRepository;
