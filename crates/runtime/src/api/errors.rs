//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, repositories, and rule sets so
//! clients can bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use game_core::{ExecuteError, GameId, MoveCodecError, SetupError};

pub use crate::codec::CodecError;
pub use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Coarse classification of every runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ErrorKind {
    IllegalMove,
    NotFound,
    DelegateBug,
    Storage,
    Codec,
    Timeout,
    Mismatch,
    Internal,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("illegal move {name}: {reason}")]
    IllegalMove { name: String, reason: String },

    #[error("game {0} not found")]
    GameNotFound(GameId),

    #[error("game {game_id} has no version {version}")]
    VersionNotFound { game_id: GameId, version: u64 },

    #[error("rule set bug in game {game_id}: {message}")]
    DelegateBug { game_id: GameId, message: String },

    #[error("game {0} is unhealthy and no longer accepts moves")]
    Unhealthy(GameId),

    #[error("proposal deadline passed before it was processed")]
    Timeout,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("failed to set up game: {0}")]
    Setup(#[from] SetupError),

    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    MoveCodec(#[from] MoveCodecError),

    #[error("move failed: {0}")]
    MoveFailed(#[source] ExecuteError),

    #[error("game {game_id} belongs to rule set {found:?}, expected {expected:?}")]
    DelegateMismatch {
        game_id: GameId,
        expected: String,
        found: String,
    },

    #[error("game worker command channel closed")]
    CommandChannelClosed,

    #[error("game worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("game worker task failed: {0}")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error("runtime lock was poisoned")]
    LockPoisoned,
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IllegalMove { .. } => ErrorKind::IllegalMove,
            Self::GameNotFound(_) | Self::VersionNotFound { .. } => ErrorKind::NotFound,
            Self::DelegateBug { .. } | Self::Unhealthy(_) | Self::DelegateMismatch { .. } => {
                ErrorKind::DelegateBug
            }
            Self::Timeout => ErrorKind::Timeout,
            Self::Repository(RepositoryError::Codec(_)) => ErrorKind::Codec,
            Self::Repository(err) if err.is_not_found() => ErrorKind::NotFound,
            Self::Repository(_) => ErrorKind::Storage,
            Self::MoveCodec(_) | Self::MoveFailed(_) => ErrorKind::DelegateBug,
            Self::Setup(_)
            | Self::InvalidConfig(_)
            | Self::CommandChannelClosed
            | Self::ReplyChannelClosed(_)
            | Self::WorkerJoin(_)
            | Self::LockPoisoned => ErrorKind::Internal,
        }
    }

    /// Lifts repository misses into the dedicated not-found variants.
    pub(crate) fn from_repository(err: RepositoryError) -> Self {
        match err {
            RepositoryError::GameNotFound(id) => Self::GameNotFound(id),
            RepositoryError::VersionNotFound { game_id, version } => {
                Self::VersionNotFound { game_id, version }
            }
            other => Self::Repository(other),
        }
    }
}
