//! Messages understood by the allocation workers

use std::time::Instant;

use crossbeam::channel::Sender;
use seat_sale_core::{CustomerId, EventId, EventMeta, Rank, ReservationHandle, SeatError};

/// Work handed from the coordinator to the allocation workers
pub enum Job {
    /// Reserve any free seat of `rank` at `event`
    Reserve {
        event: EventMeta,
        rank: Rank,
        customer: CustomerId,
        /// No attempt is started after this instant
        deadline: Option<Instant>,
        reply: Sender<Result<ReservationHandle, SeatError>>,
    },
    /// Cancel `customer`'s reservation of seat `rank`-`number` at `event`
    Cancel {
        event: EventId,
        rank: Rank,
        number: u32,
        customer: CustomerId,
        deadline: Option<Instant>,
        reply: Sender<Result<(), SeatError>>,
    },
    /// Stop the worker receiving it
    Shutdown,
}

/// Whether `deadline` has passed
#[inline]
pub fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}
