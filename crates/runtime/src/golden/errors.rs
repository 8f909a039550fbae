//! Errors raised while replaying a golden transcript.

use thiserror::Error;

use game_core::MoveCodecError;

use crate::api::{ErrorKind, RuntimeError};
use crate::codec::CodecError;
use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum GoldenError {
    /// The engine diverged from the transcript.
    #[error("golden diverged at version {version}: {what}\n{diff}")]
    Mismatch {
        version: u64,
        what: String,
        /// RFC 6902 patch turning the expected JSON into the actual JSON.
        diff: String,
        /// Log lines of the turn that diverged.
        log: String,
    },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    MoveCodec(#[from] MoveCodecError),

    #[error("unusable golden transcript: {0}")]
    Transcript(String),
}

impl GoldenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Mismatch { .. } => ErrorKind::Mismatch,
            Self::Runtime(err) => err.kind(),
            Self::Repository(RepositoryError::Codec(_)) | Self::Codec(_) => ErrorKind::Codec,
            Self::Repository(err) if err.is_not_found() => ErrorKind::NotFound,
            Self::Repository(_) => ErrorKind::Storage,
            Self::MoveCodec(_) => ErrorKind::DelegateBug,
            Self::Transcript(_) => ErrorKind::Internal,
        }
    }

    /// Version of the first divergence, for mismatches.
    pub fn mismatch_version(&self) -> Option<u64> {
        match self {
            Self::Mismatch { version, .. } => Some(*version),
            _ => None,
        }
    }
}
