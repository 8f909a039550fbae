//! Injected-data side channel.
//!
//! A per-game mailbox keyed by reverse-DNS tags. Any thread may deposit;
//! only a game's worker consumes. Two tags are reserved by the engine:
//! [`WILL_SEAT_PLAYER`] and [`PLAYER_TO_SEAT`].

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use game_core::{GameId, PlayerIndex};
use serde_json::Value;

/// Present when a game will ever need seat-player moves.
pub const WILL_SEAT_PLAYER: &str = "dev.tabletop.engine.WillSeatPlayer";

/// Present while a player waits to be seated.
pub const PLAYER_TO_SEAT: &str = "dev.tabletop.engine.PlayerToSeat";

/// A value deposited in the mailbox.
#[derive(Clone, Debug)]
pub enum InjectedData {
    Flag(bool),
    SeatPlayer(SeatSignaler),
    Json(Value),
}

impl InjectedData {
    pub fn as_seat(&self) -> Option<&SeatSignaler> {
        match self {
            Self::SeatPlayer(signaler) => Some(signaler),
            _ => None,
        }
    }

    /// Truthiness used for flag-like tags: everything but `Flag(false)` and
    /// JSON null/false.
    pub fn is_set(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::SeatPlayer(_) => true,
            Self::Json(value) => !matches!(value, Value::Null | Value::Bool(false)),
        }
    }
}

/// Announces a seat that should be filled, and is told once it has been.
///
/// A signaler built with [`SeatSignaler::on_reject`] is also told when the
/// rule set refuses the seat, so the entry can be dropped instead of
/// blocking the seats behind it.
#[derive(Clone)]
pub struct SeatSignaler {
    seat: PlayerIndex,
    on_commit: Arc<dyn Fn(PlayerIndex) + Send + Sync>,
    on_reject: Option<Arc<dyn Fn(PlayerIndex) + Send + Sync>>,
}

impl SeatSignaler {
    pub fn new(seat: PlayerIndex, on_commit: impl Fn(PlayerIndex) + Send + Sync + 'static) -> Self {
        Self {
            seat,
            on_commit: Arc::new(on_commit),
            on_reject: None,
        }
    }

    pub fn on_reject(mut self, on_reject: impl Fn(PlayerIndex) + Send + Sync + 'static) -> Self {
        self.on_reject = Some(Arc::new(on_reject));
        self
    }

    pub fn seat(&self) -> PlayerIndex {
        self.seat
    }

    /// Called by the engine after the seat move committed.
    pub fn committed(&self) {
        (self.on_commit)(self.seat);
    }

    /// Called by the engine when the seat cannot be filled. The hook must
    /// drop the entry. Returns false when there is no hook.
    pub fn rejected(&self) -> bool {
        match &self.on_reject {
            Some(on_reject) => {
                on_reject(self.seat);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for SeatSignaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeatSignaler")
            .field("seat", &self.seat)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct MailboxInner {
    entries: HashMap<(GameId, String), InjectedData>,
    defaults: HashMap<String, InjectedData>,
    seat_queues: HashMap<GameId, VecDeque<PlayerIndex>>,
}

/// Shared mailbox. Cloning shares the same storage.
#[derive(Clone, Default)]
pub struct Mailbox {
    inner: Arc<Mutex<MailboxInner>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MailboxInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `data` for one game, replacing any previous value.
    pub fn deposit(&self, id: &GameId, tag: &str, data: InjectedData) {
        self.lock()
            .entries
            .insert((id.clone(), tag.to_string()), data);
    }

    /// Stores `data` for every game without an explicit entry, including
    /// games not created yet.
    pub fn deposit_default(&self, tag: &str, data: InjectedData) {
        self.lock().defaults.insert(tag.to_string(), data);
    }

    /// Removes and returns the explicit entry for `(id, tag)`.
    pub fn take(&self, id: &GameId, tag: &str) -> Option<InjectedData> {
        self.lock().entries.remove(&(id.clone(), tag.to_string()))
    }

    /// Current value for `(id, tag)`.
    ///
    /// For [`PLAYER_TO_SEAT`] a queued seat wins over explicit entries; its
    /// signaler pops the queue on commit.
    pub fn fetch(&self, id: &GameId, tag: &str) -> Option<InjectedData> {
        let inner = self.lock();
        if tag == PLAYER_TO_SEAT
            && let Some(seat) = inner.seat_queues.get(id).and_then(|q| q.front().copied())
        {
            return Some(InjectedData::SeatPlayer(self.queue_signaler(id, seat)));
        }
        inner
            .entries
            .get(&(id.clone(), tag.to_string()))
            .or_else(|| inner.defaults.get(tag))
            .cloned()
    }

    /// Deposits a one-shot [`PLAYER_TO_SEAT`] entry for `seat`. The entry is
    /// removed as soon as the seat commits or is rejected; `on_commit` runs
    /// after the removal.
    pub fn deposit_seat(
        &self,
        id: &GameId,
        seat: PlayerIndex,
        on_commit: impl Fn(PlayerIndex) + Send + Sync + 'static,
    ) {
        let weak = Arc::downgrade(&self.inner);
        let remove = {
            let id = id.clone();
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entries
                        .remove(&(id.clone(), PLAYER_TO_SEAT.to_string()));
                }
            }
        };
        let on_reject = remove.clone();
        let signaler = SeatSignaler::new(seat, move |seated| {
            remove();
            on_commit(seated);
        })
        .on_reject(move |_| on_reject());
        self.deposit(id, PLAYER_TO_SEAT, InjectedData::SeatPlayer(signaler));
    }

    /// Queues `seat` to be seated in game `id`.
    pub fn queue_seat(&self, id: &GameId, seat: PlayerIndex) {
        self.lock()
            .seat_queues
            .entry(id.clone())
            .or_default()
            .push_back(seat);
    }

    pub fn pending_seats(&self, id: &GameId) -> Vec<PlayerIndex> {
        self.lock()
            .seat_queues
            .get(id)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Marks game `id` as one that will need seat-player moves.
    pub fn mark_will_seat(&self, id: &GameId) {
        self.deposit(id, WILL_SEAT_PLAYER, InjectedData::Flag(true));
    }

    pub fn will_seat_player(&self, id: &GameId) -> bool {
        self.fetch(id, WILL_SEAT_PLAYER)
            .is_some_and(|data| data.is_set())
    }

    fn queue_signaler(&self, id: &GameId, seat: PlayerIndex) -> SeatSignaler {
        let weak: Weak<Mutex<MailboxInner>> = Arc::downgrade(&self.inner);
        let id = id.clone();
        let pop = Arc::new(move |seated: PlayerIndex| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(queue) = inner.seat_queues.get_mut(&id)
                && queue.front() == Some(&seated)
            {
                queue.pop_front();
                if queue.is_empty() {
                    inner.seat_queues.remove(&id);
                }
            }
        });
        let on_reject = Arc::clone(&pop);
        SeatSignaler::new(seat, move |seated| pop(seated))
            .on_reject(move |seated| on_reject(seated))
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Mailbox")
            .field("entries", &inner.entries.len())
            .field("defaults", &inner.defaults.len())
            .field("seat_queues", &inner.seat_queues.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_unknown_games() {
        let mailbox = Mailbox::new();
        let id = GameId::new("later");
        assert!(!mailbox.will_seat_player(&id));
        mailbox.deposit_default(WILL_SEAT_PLAYER, InjectedData::Flag(true));
        assert!(mailbox.will_seat_player(&id));
        mailbox.deposit(&id, WILL_SEAT_PLAYER, InjectedData::Flag(false));
        assert!(!mailbox.will_seat_player(&id));
    }

    #[test]
    fn test_seat_queue_advances_on_commit() {
        let mailbox = Mailbox::new();
        let id = GameId::new("g");
        mailbox.queue_seat(&id, PlayerIndex::seat(1));
        mailbox.queue_seat(&id, PlayerIndex::seat(2));

        let first = mailbox.fetch(&id, PLAYER_TO_SEAT).unwrap();
        let signaler = first.as_seat().unwrap();
        assert_eq!(signaler.seat(), PlayerIndex::seat(1));
        signaler.committed();
        // A second commit of the same signaler must not skip seat 2.
        signaler.committed();

        let next = mailbox.fetch(&id, PLAYER_TO_SEAT).unwrap();
        assert_eq!(next.as_seat().unwrap().seat(), PlayerIndex::seat(2));
        next.as_seat().unwrap().committed();
        assert!(mailbox.fetch(&id, PLAYER_TO_SEAT).is_none());
    }

    #[test]
    fn test_rejected_seat_unblocks_the_queue() {
        let mailbox = Mailbox::new();
        let id = GameId::new("g");
        mailbox.queue_seat(&id, PlayerIndex::seat(0));
        mailbox.queue_seat(&id, PlayerIndex::seat(1));

        let first = mailbox.fetch(&id, PLAYER_TO_SEAT).unwrap();
        assert!(first.as_seat().unwrap().rejected());
        assert_eq!(mailbox.pending_seats(&id), vec![PlayerIndex::seat(1)]);
    }

    #[test]
    fn test_deposited_seat_is_removed_on_commit() {
        let mailbox = Mailbox::new();
        let id = GameId::new("g");
        let commits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&commits);
        mailbox.deposit_seat(&id, PlayerIndex::seat(1), move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let entry = mailbox.fetch(&id, PLAYER_TO_SEAT).unwrap();
        entry.as_seat().unwrap().committed();
        assert!(mailbox.fetch(&id, PLAYER_TO_SEAT).is_none());
        assert_eq!(commits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_plain_signaler_has_no_rejection_hook() {
        let signaler = SeatSignaler::new(PlayerIndex::seat(1), |_| {});
        assert!(!signaler.rejected());
    }

    #[test]
    fn test_take_removes_entry() {
        let mailbox = Mailbox::new();
        let id = GameId::new("g");
        mailbox.deposit(&id, "dev.tabletop.test.Note", InjectedData::Json(Value::from(3)));
        assert!(mailbox.take(&id, "dev.tabletop.test.Note").is_some());
        assert!(mailbox.fetch(&id, "dev.tabletop.test.Note").is_none());
    }
}
