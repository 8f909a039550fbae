//! Worker tasks that back the runtime orchestration.
//!
//! Each live game gets one [`GameWorker`] that serializes its writes and
//! owns its pending timers.

mod game;
mod timers;

pub(crate) use game::{Command, GameWorker, Proposal, WorkerSettings};
