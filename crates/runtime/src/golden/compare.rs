//! Structural comparison of move records and state blobs.

use serde_json::{Map, Value};

use game_core::MoveRecord;

/// What differed between an engine record and its golden counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub what: String,
    pub diff: String,
}

/// Compares everything but the timestamp, then the blobs as JSON trees.
///
/// With `skip_absolute_versions`, the version is ignored and the initiator
/// is compared as a distance back from the move, so moves can be matched
/// after insertions or deletions earlier in the transcript.
pub fn compare_move_records(
    actual: &MoveRecord,
    expected: &MoveRecord,
    skip_absolute_versions: bool,
) -> Result<(), Divergence> {
    let actual_base = base_fields(actual, skip_absolute_versions);
    let expected_base = base_fields(expected, skip_absolute_versions);
    if actual_base != expected_base {
        return Err(Divergence {
            what: format!("move record {} differs", expected.name),
            diff: json_diff(&expected_base, &actual_base),
        });
    }

    compare_json_blobs(&actual.blob, &expected.blob).map_err(|diff| Divergence {
        what: format!("blob of move {} differs", expected.name),
        diff,
    })
}

/// Structural equality; on mismatch returns the diff from expected to actual.
pub fn compare_json_blobs(actual: &Value, expected: &Value) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(json_diff(expected, actual))
    }
}

/// Pretty RFC 6902 patch turning `from` into `to`.
pub fn json_diff(from: &Value, to: &Value) -> String {
    let patch = json_patch::diff(from, to);
    serde_json::to_string_pretty(&patch).unwrap_or_else(|_| format!("{patch:?}"))
}

fn base_fields(mv: &MoveRecord, skip_absolute_versions: bool) -> Value {
    let mut fields = Map::new();
    fields.insert("Name".into(), Value::from(mv.name.clone()));
    fields.insert("Proposer".into(), Value::from(mv.proposer.0));
    fields.insert("Phase".into(), Value::from(mv.phase));
    if skip_absolute_versions {
        fields.insert("InitiatorOffset".into(), Value::from(mv.initiator_offset()));
    } else {
        fields.insert("Version".into(), Value::from(mv.version));
        fields.insert("Initiator".into(), Value::from(mv.initiator));
    }
    Value::Object(fields)
}
