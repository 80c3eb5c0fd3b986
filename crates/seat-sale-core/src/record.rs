//! Rows exchanged with the reservation store

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::seat::{identity_of, Rank, SeatId};

/// Identifier of an event
pub type EventId = u64;

/// Identifier of a reservation record, assigned by the store
pub type ReservationId = u64;

/// Identifier of the customer making requests
pub type CustomerId = Uuid;

/// Event attributes owned by the store
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EventMeta {
    /// The event's id
    pub id: EventId,
    /// Display title
    pub title: String,
    /// Whether the event is listed publicly
    pub public: bool,
    /// Whether sales are closed
    pub closed: bool,
    /// Added to every seat's base price
    pub price: i64,
}

impl EventMeta {
    /// Whether new reservations are accepted
    #[inline]
    pub fn is_open(&self) -> bool {
        self.public && !self.closed
    }

    /// Effective price of a seat of `rank` at this event
    #[inline]
    pub fn seat_price(&self, rank: Rank) -> i64 {
        self.price + rank.base_price()
    }
}

/// A reservation as stored
///
/// Records are never deleted; canceling one sets [`Self::canceled_at`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ReservationRecord {
    /// Store-assigned id
    pub id: ReservationId,
    /// Event the seat belongs to
    pub event: EventId,
    /// Reserved seat
    pub seat: SeatId,
    /// Holder of the reservation
    pub customer: CustomerId,
    /// Time the reservation was committed
    pub reserved_at: DateTime<Utc>,
    /// Time the reservation was canceled, [`None`] while active
    pub canceled_at: Option<DateTime<Utc>>,
    /// Event price at the time of booking
    pub event_price: i64,
}

impl ReservationRecord {
    /// Whether the record still holds its seat
    #[inline]
    pub fn is_active(&self) -> bool {
        self.canceled_at.is_none()
    }

    /// Price paid for the seat
    #[inline]
    pub fn price(&self) -> i64 {
        self.event_price + identity_of(self.seat).base_price
    }

    /// The later of reservation and cancellation time
    #[inline]
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.canceled_at.unwrap_or(self.reserved_at)
    }
}

/// Result of a successful reservation
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ReservationHandle {
    /// Id of the new reservation record
    pub id: ReservationId,
    /// Event the seat belongs to
    pub event: EventId,
    /// Reserved seat
    pub seat: SeatId,
    /// Rank of the reserved seat
    pub rank: Rank,
    /// Rank-local number of the reserved seat
    pub number: u32,
}
