//! Store wrapper injecting the failures a remote store exhibits

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use seat_sale_core::{
    CustomerId, EventId, EventMeta, InsertError, Rank, ReservationId, ReservationRecord,
    ReservationStore, Scope, SeatId, StoreError, StoreResult,
};
use seat_sale_engine::Database;
use uuid::Uuid;

/// Wraps a [`Database`], passing every call through unless told otherwise
pub struct FlakyStore {
    inner: Arc<Database>,
    fail_refreshes: AtomicBool,
    reverse_changes: AtomicBool,
    failing_inserts: AtomicU32,
    stolen_inserts: AtomicU32,
    failing_cancels: AtomicU32,
    insert_delay: Mutex<Option<Duration>>,
}

/// Customer of the reservations made by [`FlakyStore::steal_next_inserts()`]
pub const THIEF: Uuid = Uuid::from_u128(0x7417_ef00);

impl FlakyStore {
    pub fn new(inner: Arc<Database>) -> Self {
        Self {
            inner,
            fail_refreshes: AtomicBool::new(false),
            reverse_changes: AtomicBool::new(false),
            failing_inserts: AtomicU32::new(0),
            stolen_inserts: AtomicU32::new(0),
            failing_cancels: AtomicU32::new(0),
            insert_delay: Mutex::new(None),
        }
    }

    /// Make change queries fail until called again with `false`
    pub fn fail_refreshes(&self, fail: bool) {
        self.fail_refreshes.store(fail, Ordering::SeqCst);
    }

    /// Report changes newest first, as a store without ordering guarantees may
    pub fn reverse_changes(&self, reverse: bool) {
        self.reverse_changes.store(reverse, Ordering::SeqCst);
    }

    /// Make the next `n` inserts fail with a transient error
    pub fn fail_next_inserts(&self, n: u32) {
        self.failing_inserts.store(n, Ordering::SeqCst);
    }

    /// Let a concurrent writer take the seat of each of the next `n` inserts
    /// just before they commit
    pub fn steal_next_inserts(&self, n: u32) {
        self.stolen_inserts.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` cancellations fail with a transient error
    pub fn fail_next_cancels(&self, n: u32) {
        self.failing_cancels.store(n, Ordering::SeqCst);
    }

    /// Sleep for `delay` before every insert
    pub fn delay_inserts(&self, delay: Option<Duration>) {
        *self.insert_delay.lock() = delay;
    }

    fn unavailable(what: &str) -> StoreError {
        StoreError::Unavailable(format!("injected {what} failure"))
    }
}

/// Decrement `counter` unless it is zero, returning whether it was decremented
fn take(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl ReservationStore for FlakyStore {
    fn changes_since(
        &self,
        scope: Scope,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<ReservationRecord>> {
        if self.fail_refreshes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("query"));
        }
        let mut changes = self.inner.changes_since(scope, since)?;
        if self.reverse_changes.load(Ordering::SeqCst) {
            changes.reverse();
        }
        Ok(changes)
    }

    fn free_seats(&self, event: EventId, rank: Rank) -> StoreResult<Vec<SeatId>> {
        self.inner.free_seats(event, rank)
    }

    fn free_seat(&self, event: EventId, rank: Rank) -> StoreResult<Option<SeatId>> {
        self.inner.free_seat(event, rank)
    }

    fn insert_reservation(
        &self,
        event: EventId,
        seat: SeatId,
        customer: CustomerId,
        event_price: i64,
    ) -> Result<ReservationId, InsertError> {
        let delay = *self.insert_delay.lock();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        if take(&self.failing_inserts) {
            return Err(Self::unavailable("insert").into());
        }
        if take(&self.stolen_inserts) {
            self.inner
                .insert_reservation(event, seat, THIEF, event_price)?;
        }
        self.inner
            .insert_reservation(event, seat, customer, event_price)
    }

    fn cancel_reservation(
        &self,
        event: EventId,
        seat: SeatId,
        customer: CustomerId,
    ) -> StoreResult<u64> {
        if take(&self.failing_cancels) {
            return Err(Self::unavailable("cancel"));
        }
        self.inner.cancel_reservation(event, seat, customer)
    }

    fn active_holder(&self, event: EventId, seat: SeatId) -> StoreResult<Option<CustomerId>> {
        self.inner.active_holder(event, seat)
    }

    fn event(&self, event: EventId) -> StoreResult<Option<EventMeta>> {
        self.inner.event(event)
    }

    fn events(&self) -> StoreResult<Vec<EventMeta>> {
        self.inner.events()
    }

    fn reservations_of(&self, customer: CustomerId) -> StoreResult<Vec<ReservationRecord>> {
        self.inner.reservations_of(customer)
    }
}
