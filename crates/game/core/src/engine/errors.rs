//! Error types for the move execution pipeline.

use crate::error::{ApplyError, ErrorSeverity, IllegalMove, SetupError};
use crate::moves::MoveCodecError;

/// Identifies which stage of the transition pipeline produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionPhase {
    Legal,
    Apply,
    Verify,
}

impl TransitionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionPhase::Legal => "legal",
            TransitionPhase::Apply => "apply",
            TransitionPhase::Verify => "verify",
        }
    }
}

/// Errors surfaced while executing a move through the game engine.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("illegal move {name}: {source}")]
    Illegal {
        name: String,
        #[source]
        source: IllegalMove,
    },

    #[error("move {name} failed to apply: {source}")]
    Apply {
        name: String,
        #[source]
        source: ApplyError,
    },

    #[error(transparent)]
    Codec(#[from] MoveCodecError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("state does not survive a serialization round trip: {0}")]
    StateRoundTrip(String),
}

impl ExecuteError {
    pub fn phase(&self) -> TransitionPhase {
        match self {
            Self::Illegal { .. } | Self::Setup(_) => TransitionPhase::Legal,
            Self::Apply { .. } => TransitionPhase::Apply,
            Self::Codec(_) | Self::StateRoundTrip(_) => TransitionPhase::Verify,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Illegal { source, .. } => source.severity(),
            Self::Apply { source, .. } => source.severity(),
            Self::Setup(source) => source.severity(),
            Self::Codec(_) | Self::StateRoundTrip(_) => ErrorSeverity::Fatal,
        }
    }
}
