//! Error types raised by repository implementations.

use game_core::GameId;
use thiserror::Error;

use crate::codec::CodecError;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("game repository lock was poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("game {0} not found")]
    GameNotFound(GameId),

    #[error("game {game_id} has no version {version}")]
    VersionNotFound { game_id: GameId, version: u64 },

    #[error("game {game_id}: expected version {expected}, got {found}")]
    VersionConflict {
        game_id: GameId,
        expected: u64,
        found: u64,
    },

    #[error("game {0} already exists")]
    GameAlreadyExists(GameId),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

impl RepositoryError {
    /// True for missing games or versions.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::GameNotFound(_) | Self::VersionNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
