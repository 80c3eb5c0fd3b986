//! Adapter to the persistent reservation store

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;

use crate::{
    CustomerId, EventId, EventMeta, InsertError, Rank, ReservationId, ReservationRecord, SeatId,
    StoreError,
};

/// Result of a store operation
pub type StoreResult<T> = Result<T, StoreError>;

/// Which events a change query covers
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Scope {
    /// Every event
    All,
    /// A single event
    Event(EventId),
}

/// Narrow interface to the durable reservation store
///
/// Other processes may write to the same store concurrently. The store alone
/// guarantees that at most one active reservation exists per (event, seat).
///
/// 📌 Hint: Implementations are shared between threads and must tolerate
/// concurrent calls to every method.
pub trait ReservationStore: Send + Sync {
    /// All records reserved or canceled at or after `since`
    ///
    /// With `since` set to [`None`], every record in scope is returned.
    fn changes_since(
        &self,
        scope: Scope,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<ReservationRecord>>;

    /// Ids of all seats of `rank` without an active reservation at `event`
    fn free_seats(&self, event: EventId, rank: Rank) -> StoreResult<Vec<SeatId>>;

    /// One free seat of `rank`, chosen uniformly at random
    ///
    /// Stores that can pick a random row themselves should override this; the
    /// provided implementation fetches every free seat and picks locally.
    fn free_seat(&self, event: EventId, rank: Rank) -> StoreResult<Option<SeatId>> {
        let seats = self.free_seats(event, rank)?;
        Ok(seats.choose(&mut rand::thread_rng()).copied())
    }

    /// Insert an active reservation unless the seat already has one
    fn insert_reservation(
        &self,
        event: EventId,
        seat: SeatId,
        customer: CustomerId,
        event_price: i64,
    ) -> Result<ReservationId, InsertError>;

    /// Cancel the active reservation of `seat` if `customer` holds it
    ///
    /// Returns the number of records canceled (zero or one).
    fn cancel_reservation(
        &self,
        event: EventId,
        seat: SeatId,
        customer: CustomerId,
    ) -> StoreResult<u64>;

    /// Holder of the active reservation of `seat`, if any
    fn active_holder(&self, event: EventId, seat: SeatId) -> StoreResult<Option<CustomerId>>;

    /// Attributes of a single event
    fn event(&self, event: EventId) -> StoreResult<Option<EventMeta>>;

    /// Attributes of every event, ordered by id
    fn events(&self) -> StoreResult<Vec<EventMeta>>;

    /// Every record (active or canceled) held by `customer`
    fn reservations_of(&self, customer: CustomerId) -> StoreResult<Vec<ReservationRecord>>;
}
