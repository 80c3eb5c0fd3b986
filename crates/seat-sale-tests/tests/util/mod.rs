use eyre::{eyre, Result};
use seat_sale_core::{EventId, EventView, Rank, ReservationHandle};
use seat_sale_tests::{TestCtx, UserSession};

/// Reserves a seat and checks the handle is consistent with the request.
#[allow(unused)]
pub async fn reserve(
    session: &UserSession,
    event: EventId,
    rank: Rank,
) -> Result<ReservationHandle> {
    let handle = session.reserve(event, rank).await??;
    assert_eq!(handle.event, event, "The handle must name the requested event.");
    assert_eq!(handle.rank, rank, "The reserved seat must have the requested rank.");
    assert!(
        rank.seat_ids().contains(&handle.seat),
        "Seat {} does not belong to rank {rank}.",
        handle.seat
    );
    Ok(handle)
}

/// Finds the summary of `event` in the listing of all events.
#[allow(unused)]
pub async fn listed(ctx: &TestCtx, event: EventId) -> Result<EventView> {
    ctx.api
        .list_events(true)
        .await??
        .into_iter()
        .find(|view| view.id == event)
        .ok_or_else(|| eyre!("Event {event} is missing from the listing."))
}
