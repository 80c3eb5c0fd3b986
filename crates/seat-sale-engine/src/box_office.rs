//! Implementation of the box office, the entry point of all requests

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::Sender;
use seat_sale_core::{
    identity_of, CacheError, CustomerActivity, CustomerId, EventId, EventMeta, EventView, Rank,
    ReservationHandle, ReservationStore, ReservationView, SeatError, SeatService,
};
use tracing::{debug, warn};

use crate::cache::{CacheState, RefreshOutcome, SeatCache};
use crate::coordinator::Coordinator;
use crate::view;

/// Number of entries in each list of [`CustomerActivity`]
const RECENT: usize = 5;

/// Implementation of [`SeatService`]
///
/// Reads are served from the [`SeatCache`], writes are dispatched to the
/// allocation workers.
pub struct BoxOffice {
    store: Arc<dyn ReservationStore>,
    cache: Arc<SeatCache>,
    coordinator: Coordinator,
    request_timeout: Option<Duration>,
    refresher_shutdown: Sender<()>,
    refresher_thread: JoinHandle<()>,
}

impl BoxOffice {
    /// Create a new [`BoxOffice`]
    pub fn new(
        store: Arc<dyn ReservationStore>,
        cache: Arc<SeatCache>,
        coordinator: Coordinator,
        request_timeout: Option<Duration>,
        refresher_shutdown: Sender<()>,
        refresher_thread: JoinHandle<()>,
    ) -> Self {
        Self {
            store,
            cache,
            coordinator,
            request_timeout,
            refresher_shutdown,
            refresher_thread,
        }
    }

    /// The seat cache shared with the refresher
    pub fn cache(&self) -> &Arc<SeatCache> {
        &self.cache
    }

    /// Like [`SeatService::reserve()`], giving up at `deadline`
    pub fn reserve_within(
        &self,
        event: EventId,
        rank: Rank,
        customer: CustomerId,
        deadline: Option<Instant>,
    ) -> Result<ReservationHandle, SeatError> {
        let meta = self.meta(event)?;
        if !meta.is_open() {
            return Err(SeatError::InvalidEvent(event));
        }
        self.coordinator.reserve(meta, rank, customer, deadline)
    }

    /// Like [`SeatService::cancel()`], giving up at `deadline`
    pub fn cancel_within(
        &self,
        event: EventId,
        rank: Rank,
        number: u32,
        customer: CustomerId,
        deadline: Option<Instant>,
    ) -> Result<(), SeatError> {
        // releasing a seat stays possible after sales are closed
        if !self.meta(event)?.public {
            return Err(SeatError::InvalidEvent(event));
        }
        self.coordinator
            .cancel(event, rank, number, customer, deadline)
    }

    fn meta(&self, event: EventId) -> Result<EventMeta, SeatError> {
        self.store
            .event(event)?
            .ok_or(SeatError::UnknownEvent(event))
    }

    fn deadline(&self) -> Option<Instant> {
        self.request_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout))
    }

    /// Run `refresh` while `load` queries the store, then decide whether the
    /// cache may be read
    ///
    /// A stale projection is better than none, an absent one is not.
    fn fresh<T>(
        &self,
        refresh: impl Fn(&SeatCache) -> Result<RefreshOutcome, CacheError> + Sync,
        load: impl FnOnce() -> T,
    ) -> Result<T, SeatError> {
        let cache = &*self.cache;
        let refresh = &refresh;
        let (refreshed, loaded) = thread::scope(|s| {
            let refresher = thread::Builder::new()
                .name("read_refresh".to_owned())
                .spawn_scoped(s, move || refresh(cache));
            let loaded = load();
            let refreshed = match refresher {
                Ok(refresher) => match refresher.join() {
                    Ok(refreshed) => refreshed,
                    Err(panic) => std::panic::resume_unwind(panic),
                },
                Err(err) => {
                    debug!(error = %err, "could not spawn refresh thread, refreshing inline");
                    refresh(cache)
                }
            };
            (refreshed, loaded)
        });

        match refreshed {
            Ok(_) => Ok(loaded),
            Err(err) if self.cache.state() == CacheState::Populated => {
                debug!(error = %err, "serving stale seat cache");
                Ok(loaded)
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl SeatService for BoxOffice {
    fn list_events(&self, include_hidden: bool) -> Result<Vec<EventView>, SeatError> {
        let events = self.fresh(SeatCache::refresh_all, || self.store.events())??;
        Ok(self.cache.read_all(|reserved| {
            events
                .iter()
                .filter(|meta| include_hidden || meta.public)
                .map(|meta| match reserved.get(&meta.id) {
                    Some(seats) => view::summary(meta, seats),
                    None => view::summary(meta, &Default::default()),
                })
                .collect()
        }))
    }

    fn event(&self, event: EventId, viewer: Option<CustomerId>) -> Result<EventView, SeatError> {
        let meta = self.fresh(|cache| cache.refresh_event(event), || self.meta(event))??;

        Ok(self
            .cache
            .read(event, |seats| view::detailed(&meta, seats, viewer)))
    }

    fn reserve(
        &self,
        event: EventId,
        rank: Rank,
        customer: CustomerId,
    ) -> Result<ReservationHandle, SeatError> {
        self.reserve_within(event, rank, customer, self.deadline())
    }

    fn cancel(
        &self,
        event: EventId,
        rank: Rank,
        number: u32,
        customer: CustomerId,
    ) -> Result<(), SeatError> {
        self.cancel_within(event, rank, number, customer, self.deadline())
    }

    fn customer_activity(&self, customer: CustomerId) -> Result<CustomerActivity, SeatError> {
        let mut records =
            self.fresh(SeatCache::refresh_all, || self.store.reservations_of(customer))??;
        records.sort_by(|a, b| {
            b.last_touched()
                .cmp(&a.last_touched())
                .then_with(|| b.id.cmp(&a.id))
        });

        let total_price = records
            .iter()
            .filter(|rv| rv.is_active())
            .map(|rv| rv.price())
            .sum();

        let mut seen = HashSet::new();
        let mut metas = Vec::new();
        for rv in &records {
            if metas.len() == RECENT {
                break;
            }
            if !seen.insert(rv.event) {
                continue;
            }
            match self.store.event(rv.event)? {
                Some(meta) => metas.push(meta),
                None => warn!(event = rv.event, "reservation of unknown event"),
            }
        }

        let recent_events: Vec<EventView> = self.cache.read_all(|reserved| {
            metas
                .iter()
                .map(|meta| match reserved.get(&meta.id) {
                    Some(seats) => view::summary(meta, seats),
                    None => view::summary(meta, &Default::default()),
                })
                .collect()
        });

        let mut recent_reservations = Vec::with_capacity(RECENT);
        for rv in records.iter().take(RECENT) {
            let event = match recent_events.iter().find(|ev| ev.id == rv.event) {
                Some(summary) => summary.sanitize(),
                None => {
                    let Some(meta) = self.store.event(rv.event)? else {
                        continue;
                    };
                    self.cache
                        .read(meta.id, |seats| view::summary(&meta, seats))
                        .sanitize()
                }
            };
            let seat = identity_of(rv.seat);
            recent_reservations.push(ReservationView {
                id: rv.id,
                event,
                sheet_rank: seat.rank,
                sheet_num: seat.number,
                price: rv.price(),
                reserved_at: rv.reserved_at,
                canceled_at: rv.canceled_at,
            });
        }

        Ok(CustomerActivity {
            recent_reservations,
            total_price,
            recent_events,
        })
    }

    fn reinitialize(&self) -> Result<(), SeatError> {
        self.cache.reset();
        self.cache.refresh_all()?;
        Ok(())
    }

    fn shutdown(self) {
        // tell the refresher to shut down
        let _ = self.refresher_shutdown.send(());
        if self.refresher_thread.join().is_err() {
            warn!("refresher panicked");
        }
        // tell the workers to shut down
        self.coordinator.shutdown();
    }
}
