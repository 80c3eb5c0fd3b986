//! Implementation of the seat availability cache
//!
//! The cache projects the store's active reservations into memory, per event
//! and seat. It is refreshed incrementally: every refresh asks the store for
//! the records reserved or canceled since the previous refresh started, moved
//! back by a safety skew to tolerate clock and replication lag.
//!
//! Refreshes are serialized by the watermark mutex. The store is queried while
//! holding only that mutex; the projection's write lock is taken just for
//! applying the changes, so readers never wait for a store round-trip.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use seat_sale_core::{
    CacheError, Config, EventId, ReservationRecord, ReservationStore, Scope, SeatId,
};
use tracing::{debug, info, warn};

/// Active reservations of one event, by seat
pub type SeatMap = HashMap<SeatId, ReservationRecord>;

/// Lifecycle of the cache
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CacheState {
    /// No full refresh has succeeded since construction or the last reset
    Uninitialized,
    /// The projection reflects the store as of the watermark
    Populated,
}

/// What a refresh did
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefreshOutcome {
    /// The store was queried and `changes` records were applied
    Refreshed {
        /// Number of records returned by the store
        changes: usize,
    },
    /// A refresh at least as recent as this one already happened
    Skipped,
}

#[derive(Default)]
struct Watermarks {
    /// Start time of the last successful full refresh
    all: Option<DateTime<Utc>>,
    /// Start time of the last successful refresh of single events
    events: HashMap<EventId, DateTime<Utc>>,
}

/// Process-wide projection of the active reservations
pub struct SeatCache {
    store: Arc<dyn ReservationStore>,
    safety_skew: TimeDelta,
    debounce: TimeDelta,

    /// Held for the whole duration of a refresh
    watermarks: Mutex<Watermarks>,
    /// reserved[event][seat]
    reserved: RwLock<HashMap<EventId, SeatMap>>,
}

impl SeatCache {
    /// Create an uninitialized cache reading from `store`
    pub fn new(store: Arc<dyn ReservationStore>, config: &Config) -> Self {
        Self {
            store,
            safety_skew: TimeDelta::from_std(config.safety_skew()).unwrap_or(TimeDelta::MAX),
            debounce: TimeDelta::from_std(config.refresh_debounce()).unwrap_or(TimeDelta::MAX),
            watermarks: Mutex::new(Watermarks::default()),
            reserved: RwLock::new(HashMap::new()),
        }
    }

    /// Whether a full refresh has succeeded since the last reset
    pub fn state(&self) -> CacheState {
        if self.watermarks.lock().all.is_some() {
            CacheState::Populated
        } else {
            CacheState::Uninitialized
        }
    }

    /// Start time of the last successful full refresh
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermarks.lock().all
    }

    /// Incorporate the store's changes to all events.
    ///
    /// On failure the watermark stays where it was, so the next refresh
    /// queries the same window again.
    pub fn refresh_all(&self) -> Result<RefreshOutcome, CacheError> {
        let started = Utc::now();
        let mut marks = self.watermarks.lock();
        self.refresh_all_locked(&mut marks, started)
    }

    fn refresh_all_locked(
        &self,
        marks: &mut Watermarks,
        started: DateTime<Utc>,
    ) -> Result<RefreshOutcome, CacheError> {
        if self.covers(marks.all, started) {
            return Ok(RefreshOutcome::Skipped);
        }

        let since = self.window_start(marks.all);
        let changes = self.fetch(Scope::All, since)?;
        let count = changes.len();
        self.apply(changes);

        marks.all = Some(started);
        // per-event marks older than the full refresh carry no information
        marks.events.retain(|_, mark| *mark > started);
        debug!(changes = count, ?since, "refreshed seat cache");
        Ok(RefreshOutcome::Refreshed { changes: count })
    }

    /// Incorporate the store's changes to a single event.
    ///
    /// Skipped if a full refresh or a refresh of the same event is at least as
    /// recent. An uninitialized cache is populated with a full refresh first.
    pub fn refresh_event(&self, event: EventId) -> Result<RefreshOutcome, CacheError> {
        let started = Utc::now();
        let mut marks = self.watermarks.lock();
        let Some(all) = marks.all else {
            return self.refresh_all_locked(&mut marks, started);
        };

        let event_mark = marks.events.get(&event).copied();
        if self.covers(Some(all), started) || self.covers(event_mark, started) {
            return Ok(RefreshOutcome::Skipped);
        }

        let base = event_mark.map_or(all, |mark| mark.max(all));
        let since = self.window_start(Some(base));
        let changes = self.fetch(Scope::Event(event), since)?;
        let count = changes.len();
        self.apply(changes);

        marks.events.insert(event, started);
        debug!(event, changes = count, ?since, "refreshed seat cache for event");
        Ok(RefreshOutcome::Refreshed { changes: count })
    }

    /// Clear the projection and return to [`CacheState::Uninitialized`]
    pub fn reset(&self) {
        let mut marks = self.watermarks.lock();
        *marks = Watermarks::default();
        self.reserved.write().clear();
        info!("seat cache reset");
    }

    /// Copy of the active reservations of `event`
    ///
    /// Empty for events without active reservations and for unknown events.
    pub fn snapshot(&self, event: EventId) -> SeatMap {
        self.read(event, SeatMap::clone)
    }

    /// Run `f` on the active reservations of `event` under the read lock
    pub fn read<R>(&self, event: EventId, f: impl FnOnce(&SeatMap) -> R) -> R {
        let reserved = self.reserved.read();
        match reserved.get(&event) {
            Some(seats) => f(seats),
            None => f(&SeatMap::new()),
        }
    }

    /// Run `f` on the active reservations of all events under the read lock
    pub fn read_all<R>(&self, f: impl FnOnce(&HashMap<EventId, SeatMap>) -> R) -> R {
        f(&self.reserved.read())
    }

    /// Whether a refresh finished at `mark` makes one starting at `started`
    /// redundant
    fn covers(&self, mark: Option<DateTime<Utc>>, started: DateTime<Utc>) -> bool {
        mark.is_some_and(|mark| started.signed_duration_since(mark) < self.debounce)
    }

    /// Lower bound of the change query following a refresh at `mark`
    ///
    /// [`None`] asks for every record.
    fn window_start(&self, mark: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        mark.and_then(|mark| mark.checked_sub_signed(self.safety_skew))
    }

    fn fetch(
        &self,
        scope: Scope,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReservationRecord>, CacheError> {
        self.store.changes_since(scope, since).map_err(|err| {
            warn!(?scope, error = %err, "seat cache refresh failed, keeping stale projection");
            CacheError::Store(err)
        })
    }

    fn apply(&self, changes: Vec<ReservationRecord>) {
        let mut reserved = self.reserved.write();
        for rv in changes {
            if rv.is_active() {
                reserved.entry(rv.event).or_default().insert(rv.seat, rv);
                continue;
            }
            // only drop the seat if the cancellation is for the cached record;
            // otherwise the seat has been reserved again in the meantime
            if let Some(seats) = reserved.get_mut(&rv.event) {
                if seats.get(&rv.seat).is_some_and(|cached| cached.id == rv.id) {
                    seats.remove(&rv.seat);
                }
            }
        }
    }
}
