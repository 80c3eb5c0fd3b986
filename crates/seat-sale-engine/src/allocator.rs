//! Implementation of the seat allocator
//!
//! The allocator writes straight to the store. It never touches the cache;
//! the cache observes the new records on its next refresh.

use std::sync::Arc;
use std::time::Instant;

use seat_sale_core::{
    identity_of, seat_id_of, CustomerId, EventId, EventMeta, InsertError, Rank,
    ReservationHandle, ReservationStore, SeatError,
};
use tracing::{debug, warn};

use crate::job::expired;

/// Picks and commits seats, resolving races through the store's uniqueness
/// guarantee
pub struct Allocator {
    store: Arc<dyn ReservationStore>,
    max_attempts: u32,
}

impl Allocator {
    /// Create an [`Allocator`] making at most `max_attempts` attempts per
    /// operation
    pub fn new(store: Arc<dyn ReservationStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Reserve a random free seat of `rank` at `event` for `customer`.
    ///
    /// The caller has checked that the event exists and accepts reservations.
    /// No attempt is started once `deadline` has passed; an insert already in
    /// flight is allowed to commit.
    pub fn reserve(
        &self,
        event: &EventMeta,
        rank: Rank,
        customer: CustomerId,
        deadline: Option<Instant>,
    ) -> Result<ReservationHandle, SeatError> {
        for attempt in 1..=self.max_attempts {
            if expired(deadline) {
                debug!(event = event.id, %rank, attempt, "deadline passed, no further attempt");
                return Err(SeatError::DeadlineExceeded);
            }
            // pick among all free seats so concurrent allocators spread out
            let seat = match self.store.free_seat(event.id, rank) {
                Ok(Some(seat)) => seat,
                Ok(None) => return Err(SeatError::SoldOut),
                Err(err) if err.is_transient() => {
                    warn!(event = event.id, %rank, attempt, error = %err, "free seat lookup failed");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            match self
                .store
                .insert_reservation(event.id, seat, customer, event.price)
            {
                Ok(id) => {
                    let identity = identity_of(seat);
                    return Ok(ReservationHandle {
                        id,
                        event: event.id,
                        seat,
                        rank: identity.rank,
                        number: identity.number,
                    });
                }
                Err(InsertError::Conflict { .. }) => {
                    debug!(event = event.id, seat, attempt, "lost race for seat");
                }
                Err(InsertError::Store(err)) if err.is_transient() => {
                    warn!(event = event.id, seat, attempt, error = %err, "reservation insert failed");
                }
                Err(InsertError::Store(err)) => return Err(err.into()),
            }
        }

        warn!(event = event.id, %rank, attempts = self.max_attempts, "giving up on reservation");
        Err(SeatError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Cancel the reservation `customer` holds for seat `rank`-`number`.
    ///
    /// Like [`Self::reserve()`], starts no attempt after `deadline`.
    pub fn cancel(
        &self,
        event: EventId,
        rank: Rank,
        number: u32,
        customer: CustomerId,
        deadline: Option<Instant>,
    ) -> Result<(), SeatError> {
        let seat = seat_id_of(rank, number)?;
        if identity_of(seat).rank != rank {
            return Err(SeatError::InvalidSeat { rank, number });
        }

        for attempt in 1..=self.max_attempts {
            if expired(deadline) {
                debug!(event, seat, attempt, "deadline passed, no further attempt");
                return Err(SeatError::DeadlineExceeded);
            }
            match self.store.cancel_reservation(event, seat, customer) {
                Ok(0) => {}
                Ok(_) => return Ok(()),
                Err(err) if err.is_transient() => {
                    warn!(event, seat, attempt, error = %err, "cancellation failed");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }

            // nothing matched: find out whether the seat is free or taken by
            // somebody else
            match self.store.active_holder(event, seat) {
                Ok(None) => return Err(SeatError::NotReserved),
                Ok(Some(_)) => return Err(SeatError::NotPermitted),
                Err(err) if err.is_transient() => {
                    warn!(event, seat, attempt, error = %err, "reservation lookup failed");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(event, seat, attempts = self.max_attempts, "giving up on cancellation");
        Err(SeatError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}
