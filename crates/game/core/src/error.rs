//! Common error infrastructure for game-core.
//!
//! Rule-level errors ([`IllegalMove`], [`ApplyError`]) are produced by rule
//! sets; [`SetupError`] covers game creation. Each carries an
//! [`ErrorSeverity`] so the runtime can decide whether to report, retry, or
//! mark a game unhealthy.

use crate::player::PlayerIndex;
use crate::state::ComponentId;
use crate::variant::VariantError;

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Validation**: invalid input that should be rejected without retry
/// - **Internal**: rule-set inconsistency that requires investigation
/// - **Fatal**: the game can no longer continue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    Validation,
    Internal,
    Fatal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }
}

/// A legality predicate rejected a move.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct IllegalMove {
    pub reason: String,
}

impl IllegalMove {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Shorthand for the common "not your turn" rejection.
    pub fn not_current_player(proposer: PlayerIndex, current: PlayerIndex) -> Self {
        Self::new(format!("{proposer} is not the current player ({current} is)"))
    }

    pub const fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }
}

/// A move that passed its legality check failed while mutating the state.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ApplyError(pub String);

impl ApplyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub const fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Internal
    }
}

/// Errors raised while creating the initial state of a game.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("{requested} players requested, rule set allows {min}..={max}")]
    PlayerCount {
        requested: usize,
        min: usize,
        max: usize,
    },

    #[error("invalid variant: {0}")]
    Variant(#[from] VariantError),

    #[error("component {0} could not be placed on any starter stack")]
    Undistributed(ComponentId),

    #[error("stack {0} does not exist")]
    UnknownStack(String),

    #[error("stack {stack} is full, cannot place component {component}")]
    StackFull { stack: String, component: ComponentId },

    #[error("setup failed: {0}")]
    Rule(String),
}

impl SetupError {
    pub const fn severity(&self) -> ErrorSeverity {
        match self {
            Self::PlayerCount { .. } | Self::Variant(_) => ErrorSeverity::Validation,
            Self::Undistributed(_) | Self::UnknownStack(_) | Self::StackFull { .. } => {
                ErrorSeverity::Internal
            }
            Self::Rule(_) => ErrorSeverity::Fatal,
        }
    }
}
