//! Golden transcripts: recorded games used as regression oracles.
//!
//! [`compare_golden`] replays a transcript and fails on the first divergence;
//! [`remaster_golden`] rewrites it with the engine's current behaviour while
//! keeping its description and, where moves still align, its timestamps.

mod align;
mod compare;
mod comparer;
mod errors;

use std::path::Path;

use game_core::RuleDelegate;

pub use align::align_timestamps;
pub use compare::{Divergence, compare_json_blobs, compare_move_records, json_diff};
pub use comparer::GoldenComparer;
pub use errors::GoldenError;

use crate::record::Record;

/// Replays the golden at `path`. Returns the last verified version.
pub async fn compare_golden<D: RuleDelegate>(
    delegate: D,
    path: impl AsRef<Path>,
) -> Result<u64, GoldenError> {
    let golden = Record::load(path.as_ref())?;
    let mut comparer = GoldenComparer::new(delegate, golden)?;
    let result = comparer.compare().await;
    comparer.shutdown().await?;
    result.map(|()| comparer.last_verified_version())
}

/// Remasters the golden at `path` in place and returns the new transcript.
pub async fn remaster_golden<D: RuleDelegate>(
    delegate: D,
    path: impl AsRef<Path>,
) -> Result<Record, GoldenError> {
    let path = path.as_ref();
    let golden = Record::load(path)?;
    let mut comparer = GoldenComparer::new(delegate, golden)?;
    let result = comparer.remaster().await;
    comparer.shutdown().await?;
    let remastered = result?;
    remastered.save(path)?;
    tracing::info!(
        target: "runtime::golden",
        path = %path.display(),
        version = remastered.game().version,
        "wrote remastered golden"
    );
    Ok(remastered)
}
