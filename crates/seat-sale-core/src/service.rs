use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{CustomerId, EventId, Rank, ReservationHandle, ReservationId, SeatError};

/// Availability of one event
///
/// Listings carry no per-seat detail; the detailed view of a single event
/// additionally fills [`RankView::detail`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct EventView {
    /// The event's id
    pub id: EventId,
    /// Display title
    pub title: String,
    /// Whether the event is listed publicly
    pub public: bool,
    /// Whether sales are closed
    pub closed: bool,
    /// Event price added to every seat
    pub price: i64,
    /// Number of seats
    pub total: u32,
    /// Number of seats without an active reservation
    pub remains: u32,
    /// Per-rank availability
    pub sheets: BTreeMap<Rank, RankView>,
}

/// Availability of one rank of an event
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct RankView {
    /// Number of seats of this rank
    pub total: u32,
    /// Number of free seats of this rank
    pub remains: u32,
    /// Effective price of a seat of this rank
    pub price: i64,
    /// Seats ordered by number, empty in listings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detail: Vec<SeatView>,
}

/// State of a single seat
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct SeatView {
    /// Rank-local number
    pub num: u32,
    /// Whether the viewer holds the reservation
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub mine: bool,
    /// Whether the seat is reserved
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reserved: bool,
    /// Time the seat was reserved
    #[serde(
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub reserved_at: Option<DateTime<Utc>>,
}

/// [`EventView`] without the fields reserved to privileged viewers
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct PublicEventView {
    /// The event's id
    pub id: EventId,
    /// Display title
    pub title: String,
    /// Number of seats
    pub total: u32,
    /// Number of seats without an active reservation
    pub remains: u32,
    /// Per-rank availability
    pub sheets: BTreeMap<Rank, RankView>,
}

impl EventView {
    /// Strip the event price and the visibility and closed flags
    pub fn sanitize(&self) -> PublicEventView {
        PublicEventView {
            id: self.id,
            title: self.title.clone(),
            total: self.total,
            remains: self.remains,
            sheets: self.sheets.clone(),
        }
    }

    /// Drop the per-seat detail, keeping the counters
    pub fn into_summary(mut self) -> Self {
        for rank in self.sheets.values_mut() {
            rank.detail = Vec::new();
        }
        self
    }
}

/// A past or current reservation of a customer
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ReservationView {
    /// Reservation id
    pub id: ReservationId,
    /// Summary of the event the seat belongs to
    pub event: PublicEventView,
    /// Rank of the seat
    pub sheet_rank: Rank,
    /// Rank-local number of the seat
    pub sheet_num: u32,
    /// Price paid
    pub price: i64,
    /// Time the seat was reserved
    #[serde(with = "chrono::serde::ts_seconds")]
    pub reserved_at: DateTime<Utc>,
    /// Time the reservation was canceled
    #[serde(
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub canceled_at: Option<DateTime<Utc>>,
}

/// What a customer has recently done
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct CustomerActivity {
    /// The customer's latest reservations, newest first
    pub recent_reservations: Vec<ReservationView>,
    /// Sum of the prices of the customer's active reservations
    pub total_price: i64,
    /// Events the customer most recently touched, newest first
    pub recent_events: Vec<EventView>,
}

/// Operations offered to the routing and presentation layer
///
/// 📌 Hint: All methods except [`SeatService::shutdown()`] may be called
/// concurrently from different threads.
pub trait SeatService {
    /// Availability summaries of all events
    ///
    /// Hidden events are only included if `include_hidden` is set.
    fn list_events(&self, include_hidden: bool) -> Result<Vec<EventView>, SeatError>;

    /// Detailed availability of one event
    ///
    /// Seats reserved by `viewer` are flagged as [`SeatView::mine`].
    fn event(&self, event: EventId, viewer: Option<CustomerId>) -> Result<EventView, SeatError>;

    /// Reserve a random free seat of `rank`
    fn reserve(
        &self,
        event: EventId,
        rank: Rank,
        customer: CustomerId,
    ) -> Result<ReservationHandle, SeatError>;

    /// Cancel the customer's reservation of the seat `rank`-`number`
    fn cancel(
        &self,
        event: EventId,
        rank: Rank,
        number: u32,
        customer: CustomerId,
    ) -> Result<(), SeatError>;

    /// Recent reservations and events of a customer
    fn customer_activity(&self, customer: CustomerId) -> Result<CustomerActivity, SeatError>;

    /// Forget all cached state and rebuild it from the store
    fn reinitialize(&self) -> Result<(), SeatError>;

    /// Shut the seat service down
    ///
    /// This method waits for all threads spawned by the service to have
    /// terminated.
    fn shutdown(self);
}
