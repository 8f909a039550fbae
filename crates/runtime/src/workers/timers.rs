//! Pending timer moves of one game.

use std::time::Duration;

use game_core::TimerRequest;
use tokio::time::Instant;

struct ScheduledTimer<M> {
    deadline: Instant,
    seq: u64,
    mv: M,
}

/// Timers ordered by deadline, then by scheduling order.
pub(crate) struct TimerQueue<M> {
    entries: Vec<ScheduledTimer<M>>,
    next_seq: u64,
}

impl<M> TimerQueue<M> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn schedule(&mut self, requests: Vec<TimerRequest<M>>, now: Instant) {
        for request in requests {
            self.push(now + request.delay, request.mv);
        }
    }

    pub(crate) fn push(&mut self, deadline: Instant, mv: M) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let at = self
            .entries
            .partition_point(|t| (t.deadline, t.seq) <= (deadline, seq));
        self.entries.insert(at, ScheduledTimer { deadline, seq, mv });
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.first().map(|t| t.deadline)
    }

    /// Removes the earliest timer, or only a due one when `due_at` is given.
    pub(crate) fn pop(&mut self, due_at: Option<Instant>) -> Option<M> {
        let first = self.entries.first()?;
        if let Some(now) = due_at
            && first.deadline > now
        {
            return None;
        }
        Some(self.entries.remove(0).mv)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Fallback sleep target when nothing is scheduled.
pub(crate) fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(60 * 60 * 24 * 365)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_by_deadline_then_insertion() {
        let now = Instant::now();
        let mut queue = TimerQueue::new();
        queue.push(now + Duration::from_secs(5), "late");
        queue.push(now + Duration::from_secs(1), "first");
        queue.push(now + Duration::from_secs(1), "second");

        assert_eq!(queue.next_deadline(), Some(now + Duration::from_secs(1)));
        assert_eq!(queue.pop(None), Some("first"));
        assert_eq!(queue.pop(None), Some("second"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_pop_due_only_skips_future_timers() {
        let now = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule(
            vec![TimerRequest {
                delay: Duration::from_secs(30),
                mv: 7,
            }],
            now,
        );
        assert_eq!(queue.pop(Some(now)), None);
        assert_eq!(queue.pop(Some(now + Duration::from_secs(30))), Some(7));
        assert_eq!(queue.pop(None), None);
    }
}
