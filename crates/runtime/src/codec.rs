//! State patch codecs for record files.
//!
//! A record stores its state history as one patch per version, each against
//! the previous state (version 0 against `{}`). Two strategies exist:
//! [`DiffEncoder`] stores RFC 6902 operation lists, [`FullEncoder`] stores the
//! entire state. Every created patch is confirmed by re-applying it, since
//! diff libraries can silently produce wrong patches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Which strategy a record's patches use.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum EncodingKind {
    Diff,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed {kind} patch: {message}")]
    Malformed { kind: EncodingKind, message: String },

    #[error("failed to apply {kind} patch: {message}")]
    Apply { kind: EncodingKind, message: String },

    #[error("{kind} patch for version {version} does not reproduce the state")]
    ConfirmFailed { kind: EncodingKind, version: u64 },

    #[error("no encoding recognizes the first state patch")]
    UnknownEncoding,
}

/// One patch strategy.
pub trait PatchEncoder: Send + Sync {
    fn kind(&self) -> EncodingKind;

    fn create_patch(&self, prev: &Value, next: &Value) -> Result<Value, CodecError>;

    fn apply_patch(&self, prev: &Value, patch: &Value) -> Result<Value, CodecError>;

    /// Verifies that applying `patch` to `prev` yields exactly `next`.
    fn confirm_patch(
        &self,
        prev: &Value,
        next: &Value,
        patch: &Value,
        version: u64,
    ) -> Result<(), CodecError> {
        let applied = self.apply_patch(prev, patch)?;
        if &applied == next {
            Ok(())
        } else {
            Err(CodecError::ConfirmFailed {
                kind: self.kind(),
                version,
            })
        }
    }

    /// Shape check used to pick the strategy of a record read from disk.
    fn matches(&self, example_patch: &Value) -> bool;
}

/// RFC 6902 JSON Patch deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEncoder;

impl PatchEncoder for DiffEncoder {
    fn kind(&self) -> EncodingKind {
        EncodingKind::Diff
    }

    fn create_patch(&self, prev: &Value, next: &Value) -> Result<Value, CodecError> {
        let patch = json_patch::diff(prev, next);
        serde_json::to_value(&patch).map_err(|e| CodecError::Malformed {
            kind: EncodingKind::Diff,
            message: e.to_string(),
        })
    }

    fn apply_patch(&self, prev: &Value, patch: &Value) -> Result<Value, CodecError> {
        let patch: json_patch::Patch =
            serde_json::from_value(patch.clone()).map_err(|e| CodecError::Malformed {
                kind: EncodingKind::Diff,
                message: e.to_string(),
            })?;
        let mut doc = prev.clone();
        json_patch::patch(&mut doc, &patch.0).map_err(|e| CodecError::Apply {
            kind: EncodingKind::Diff,
            message: e.to_string(),
        })?;
        Ok(doc)
    }

    fn matches(&self, example_patch: &Value) -> bool {
        example_patch.is_array()
    }
}

/// Every patch is the complete state.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullEncoder;

impl PatchEncoder for FullEncoder {
    fn kind(&self) -> EncodingKind {
        EncodingKind::Full
    }

    fn create_patch(&self, _prev: &Value, next: &Value) -> Result<Value, CodecError> {
        Ok(next.clone())
    }

    fn apply_patch(&self, _prev: &Value, patch: &Value) -> Result<Value, CodecError> {
        if patch.is_object() {
            Ok(patch.clone())
        } else {
            Err(CodecError::Malformed {
                kind: EncodingKind::Full,
                message: "full patch must be an object".to_string(),
            })
        }
    }

    fn matches(&self, example_patch: &Value) -> bool {
        example_patch.is_object()
    }
}

/// The pair of strategies a record store works with.
#[derive(Clone)]
pub struct Codecs {
    diff: Arc<dyn PatchEncoder>,
    full: Arc<dyn PatchEncoder>,
}

impl Codecs {
    pub fn new(diff: Arc<dyn PatchEncoder>, full: Arc<dyn PatchEncoder>) -> Self {
        Self { diff, full }
    }

    /// Replaces the diff strategy, keeping the default full strategy.
    pub fn with_diff(diff: Arc<dyn PatchEncoder>) -> Self {
        Self {
            diff,
            full: Arc::new(FullEncoder),
        }
    }

    pub fn get(&self, kind: EncodingKind) -> &dyn PatchEncoder {
        match kind {
            EncodingKind::Diff => self.diff.as_ref(),
            EncodingKind::Full => self.full.as_ref(),
        }
    }

    /// Picks the strategy whose shape matches the first patch of a record.
    pub fn detect(&self, first_patch: &Value) -> Result<EncodingKind, CodecError> {
        [EncodingKind::Full, EncodingKind::Diff]
            .into_iter()
            .find(|kind| self.get(*kind).matches(first_patch))
            .ok_or(CodecError::UnknownEncoding)
    }

    /// Encodes a full state history, confirming every patch.
    pub fn encode_history(
        &self,
        kind: EncodingKind,
        states: &[Value],
    ) -> Result<Vec<Value>, CodecError> {
        let encoder = self.get(kind);
        let empty = Value::Object(Default::default());
        let mut patches = Vec::with_capacity(states.len());
        let mut prev = &empty;
        for (version, next) in states.iter().enumerate() {
            let patch = encoder.create_patch(prev, next)?;
            encoder.confirm_patch(prev, next, &patch, version as u64)?;
            patches.push(patch);
            prev = next;
        }
        Ok(patches)
    }
}

impl Default for Codecs {
    fn default() -> Self {
        Self::new(Arc::new(DiffEncoder), Arc::new(FullEncoder))
    }
}

impl std::fmt::Debug for Codecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codecs")
            .field("diff", &self.diff.kind())
            .field("full", &self.full.kind())
            .finish()
    }
}
