//! In-memory implementation of the reservation store

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use seat_sale_core::{
    CustomerId, EventId, EventMeta, InsertError, Rank, ReservationId, ReservationRecord,
    ReservationStore, Scope, SeatId, StoreError, StoreResult,
};

/// In-process reservation store
///
/// Holds the same tables a relational store would: events, and an append-only
/// log of reservations with an index of the active ones enforcing at most one
/// active reservation per (event, seat).
pub struct Database {
    events: DashMap<EventId, EventMeta>,
    next_event: AtomicU64,
    tables: Mutex<Tables>,
    /// Added to the wall clock when stamping records
    clock_offset: TimeDelta,
}

#[derive(Default)]
struct Tables {
    /// Every reservation ever made, indexed by `id - 1`
    records: Vec<ReservationRecord>,
    /// Id of the active reservation of each (event, seat)
    active: HashMap<(EventId, SeatId), ReservationId>,
}

impl Tables {
    fn record(&self, id: ReservationId) -> &ReservationRecord {
        &self.records[(id - 1) as usize]
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// Create a new, empty [`Database`].
    pub fn new() -> Self {
        Self::with_clock_offset(TimeDelta::zero())
    }

    /// Create a [`Database`] whose clock runs `offset` ahead of the wall clock
    ///
    /// A negative offset simulates a store lagging behind its readers.
    pub fn with_clock_offset(offset: TimeDelta) -> Self {
        Self {
            events: DashMap::new(),
            next_event: AtomicU64::new(1),
            tables: Mutex::new(Tables::default()),
            clock_offset: offset,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.clock_offset
    }

    /// Add an event and return its id.
    pub fn create_event(&self, title: impl Into<String>, public: bool, price: i64) -> EventId {
        let id = self.next_event.fetch_add(1, Ordering::Relaxed);
        self.events.insert(
            id,
            EventMeta {
                id,
                title: title.into(),
                public,
                closed: false,
                price,
            },
        );
        id
    }

    /// Change the visibility and closed flags of an event.
    pub fn edit_event(&self, event: EventId, public: bool, closed: bool) -> StoreResult<()> {
        let mut meta = self
            .events
            .get_mut(&event)
            .ok_or(StoreError::UnknownEvent(event))?;
        meta.public = public;
        meta.closed = closed;
        Ok(())
    }

    /// Get the number of active reservations of `event`.
    pub fn num_active(&self, event: EventId) -> u32 {
        let tables = self.tables.lock();
        tables.active.keys().filter(|(e, _)| *e == event).count() as u32
    }
}

impl ReservationStore for Database {
    fn changes_since(
        &self,
        scope: Scope,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<ReservationRecord>> {
        let tables = self.tables.lock();
        let in_window = |rv: &ReservationRecord| match since {
            None => true,
            Some(since) => rv.reserved_at >= since || rv.canceled_at.is_some_and(|t| t >= since),
        };
        let in_scope = |rv: &ReservationRecord| match scope {
            Scope::All => true,
            Scope::Event(event) => rv.event == event,
        };
        Ok(tables
            .records
            .iter()
            .filter(|rv| in_scope(rv) && in_window(rv))
            .cloned()
            .collect())
    }

    fn free_seats(&self, event: EventId, rank: Rank) -> StoreResult<Vec<SeatId>> {
        if !self.events.contains_key(&event) {
            return Err(StoreError::UnknownEvent(event));
        }
        let tables = self.tables.lock();
        Ok(rank
            .seat_ids()
            .filter(|seat| !tables.active.contains_key(&(event, *seat)))
            .collect())
    }

    fn free_seat(&self, event: EventId, rank: Rank) -> StoreResult<Option<SeatId>> {
        if !self.events.contains_key(&event) {
            return Err(StoreError::UnknownEvent(event));
        }
        let tables = self.tables.lock();
        Ok(rank
            .seat_ids()
            .filter(|seat| !tables.active.contains_key(&(event, *seat)))
            .choose(&mut rand::thread_rng()))
    }

    fn insert_reservation(
        &self,
        event: EventId,
        seat: SeatId,
        customer: CustomerId,
        event_price: i64,
    ) -> Result<ReservationId, InsertError> {
        if !self.events.contains_key(&event) {
            return Err(StoreError::UnknownEvent(event).into());
        }
        let mut tables = self.tables.lock();
        if tables.active.contains_key(&(event, seat)) {
            return Err(InsertError::Conflict { event, seat });
        }

        let id = tables.records.len() as ReservationId + 1;
        let reserved_at = self.now();
        tables.records.push(ReservationRecord {
            id,
            event,
            seat,
            customer,
            reserved_at,
            canceled_at: None,
            event_price,
        });
        tables.active.insert((event, seat), id);
        Ok(id)
    }

    fn cancel_reservation(
        &self,
        event: EventId,
        seat: SeatId,
        customer: CustomerId,
    ) -> StoreResult<u64> {
        let mut tables = self.tables.lock();
        let Some(&id) = tables.active.get(&(event, seat)) else {
            return Ok(0);
        };
        if tables.record(id).customer != customer {
            return Ok(0);
        }

        tables.active.remove(&(event, seat));
        let canceled_at = self.now();
        tables.records[(id - 1) as usize].canceled_at = Some(canceled_at);
        Ok(1)
    }

    fn active_holder(&self, event: EventId, seat: SeatId) -> StoreResult<Option<CustomerId>> {
        let tables = self.tables.lock();
        Ok(tables
            .active
            .get(&(event, seat))
            .map(|id| tables.record(*id).customer))
    }

    fn event(&self, event: EventId) -> StoreResult<Option<EventMeta>> {
        Ok(self.events.get(&event).map(|meta| meta.clone()))
    }

    fn events(&self) -> StoreResult<Vec<EventMeta>> {
        let mut events: Vec<EventMeta> = self.events.iter().map(|e| e.value().clone()).collect();
        events.sort_by_key(|e| e.id);
        Ok(events)
    }

    fn reservations_of(&self, customer: CustomerId) -> StoreResult<Vec<ReservationRecord>> {
        let tables = self.tables.lock();
        Ok(tables
            .records
            .iter()
            .filter(|rv| rv.customer == customer)
            .cloned()
            .collect())
    }
}
