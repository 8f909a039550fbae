//! Carries golden timestamps over to a remastered transcript.

use chrono::{DateTime, Duration, Utc};

use game_core::MoveRecord;

use super::compare::compare_move_records;

fn same_move(a: &MoveRecord, b: &MoveRecord) -> bool {
    compare_move_records(a, b, true).is_ok()
}

/// Length of the run of matching moves starting at `new[i]` / `golden[j]`.
fn match_run(new: &[MoveRecord], golden: &[MoveRecord], i: usize, j: usize) -> usize {
    new[i..]
        .iter()
        .zip(&golden[j..])
        .take_while(|(a, b)| same_move(a, b))
        .count()
}

/// Overwrites the timestamps of `moves` with those of `golden` where the two
/// transcripts still agree.
///
/// Moves are matched in order. When the next golden move does not match, the
/// golden candidate with the longest run of subsequent matches wins (ties go
/// to the earliest). Unmatched stretches are interpolated linearly between
/// their neighbours, or copy the only neighbour at either end. The result is
/// non-decreasing.
pub fn align_timestamps(moves: &mut [MoveRecord], golden: &[MoveRecord]) {
    let mut aligned: Vec<Option<DateTime<Utc>>> = vec![None; moves.len()];

    let mut g = 0;
    for i in 0..moves.len() {
        if g >= golden.len() {
            break;
        }
        if same_move(&moves[i], &golden[g]) {
            aligned[i] = Some(golden[g].timestamp);
            g += 1;
            continue;
        }

        let mut best: Option<(usize, usize)> = None;
        for j in g + 1..golden.len() {
            let run = match_run(moves, golden, i, j);
            if run > 0 && best.is_none_or(|(_, best_run)| run > best_run) {
                best = Some((j, run));
            }
        }
        if let Some((j, _)) = best {
            aligned[i] = Some(golden[j].timestamp);
            g = j + 1;
        }
    }

    if aligned.iter().all(Option::is_none) {
        clamp_non_decreasing(moves);
        return;
    }

    let mut i = 0;
    while i < aligned.len() {
        if aligned[i].is_some() {
            i += 1;
            continue;
        }
        let start = i;
        while i < aligned.len() && aligned[i].is_none() {
            i += 1;
        }
        let left = start.checked_sub(1).and_then(|l| aligned[l]);
        let right = aligned.get(i).copied().flatten();
        fill_hole(&mut aligned[start..i], left, right);
    }

    for (mv, timestamp) in moves.iter_mut().zip(aligned) {
        if let Some(timestamp) = timestamp {
            mv.timestamp = timestamp;
        }
    }
    clamp_non_decreasing(moves);
}

fn fill_hole(
    hole: &mut [Option<DateTime<Utc>>],
    left: Option<DateTime<Utc>>,
    right: Option<DateTime<Utc>>,
) {
    let len = hole.len() as i64;
    for (k, slot) in hole.iter_mut().enumerate() {
        *slot = match (left, right) {
            (Some(left), Some(right)) => {
                let span = (right - left).num_milliseconds();
                Some(left + Duration::milliseconds(span * (k as i64 + 1) / (len + 1)))
            }
            (Some(edge), None) | (None, Some(edge)) => Some(edge),
            (None, None) => None,
        };
    }
}

fn clamp_non_decreasing(moves: &mut [MoveRecord]) {
    let mut latest: Option<DateTime<Utc>> = None;
    for mv in moves {
        if let Some(latest) = latest
            && mv.timestamp < latest
        {
            mv.timestamp = latest;
        }
        latest = Some(mv.timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use game_core::PlayerIndex;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn mv(version: u64, name: &str, secs: i64) -> MoveRecord {
        MoveRecord {
            name: name.into(),
            version,
            initiator: version,
            phase: 0,
            proposer: PlayerIndex::seat(0),
            timestamp: at(secs),
            blob: json!({}),
        }
    }

    fn is_sorted(moves: &[MoveRecord]) -> bool {
        moves.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
    }

    #[test]
    fn test_identical_transcripts_copy_timestamps() {
        let golden = vec![mv(1, "Roll", 10), mv(2, "CountDie", 20)];
        let mut new = vec![mv(1, "Roll", 500), mv(2, "CountDie", 600)];
        align_timestamps(&mut new, &golden);
        assert_eq!(new[0].timestamp, at(10));
        assert_eq!(new[1].timestamp, at(20));
    }

    #[test]
    fn test_inserted_move_is_interpolated() {
        let golden = vec![mv(1, "Roll", 10), mv(2, "CountDie", 30)];
        let mut new = vec![mv(1, "Roll", 0), mv(2, "Done", 0), mv(3, "CountDie", 0)];
        align_timestamps(&mut new, &golden);
        assert_eq!(new[0].timestamp, at(10));
        assert_eq!(new[1].timestamp, at(20));
        assert_eq!(new[2].timestamp, at(30));
    }

    #[test]
    fn test_deleted_golden_move_is_skipped() {
        let golden = vec![
            mv(1, "Roll", 10),
            mv(2, "Done", 20),
            mv(3, "CountDie", 30),
            mv(4, "Roll", 40),
        ];
        let mut new = vec![mv(1, "Roll", 0), mv(2, "CountDie", 0), mv(3, "Roll", 0)];
        align_timestamps(&mut new, &golden);
        assert_eq!(new[1].timestamp, at(30));
        assert_eq!(new[2].timestamp, at(40));
    }

    #[test]
    fn test_scan_ahead_finds_later_match() {
        let golden = vec![
            mv(1, "Roll", 10),
            mv(2, "CountDie", 20),
            mv(3, "Done", 30),
            mv(4, "CountDie", 40),
            mv(5, "Roll", 50),
        ];
        let mut new = vec![mv(1, "Roll", 0), mv(2, "CountDie", 0), mv(3, "Roll", 0)];
        align_timestamps(&mut new, &golden);
        assert_eq!(new[2].timestamp, at(50));
    }

    #[test]
    fn test_scan_ahead_prefers_longest_run_over_earliest() {
        let golden = vec![
            mv(1, "Roll", 10),
            mv(2, "Done", 20),
            mv(3, "CountDie", 30),
            mv(4, "Roll", 40),
            mv(5, "CountDie", 50),
            mv(6, "Roll", 60),
            mv(7, "Done", 70),
        ];
        let mut new = vec![
            mv(1, "Roll", 0),
            mv(2, "CountDie", 0),
            mv(3, "Roll", 0),
            mv(4, "Done", 0),
        ];
        align_timestamps(&mut new, &golden);
        // golden[2] matches two moves, golden[4] matches all three.
        assert_eq!(new[1].timestamp, at(50));
        assert_eq!(new[2].timestamp, at(60));
        assert_eq!(new[3].timestamp, at(70));
        assert!(is_sorted(&new));
    }

    #[test]
    fn test_trailing_hole_copies_edge_and_stays_sorted() {
        let golden = vec![mv(1, "Roll", 100)];
        let mut new = vec![mv(1, "Roll", 0), mv(2, "Done", 5), mv(3, "FinishTurn", 1)];
        align_timestamps(&mut new, &golden);
        assert_eq!(new[1].timestamp, at(100));
        assert_eq!(new[2].timestamp, at(100));
        assert!(is_sorted(&new));
    }
}
