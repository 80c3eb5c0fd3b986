//! Availability views built from a cache snapshot

use seat_sale_core::{
    all_seats, CustomerId, EventMeta, EventView, Rank, RankView, SeatView, TOTAL_SEATS,
};

use crate::cache::SeatMap;

/// Counters only, as shown in event listings
pub fn summary(meta: &EventMeta, seats: &SeatMap) -> EventView {
    build(meta, seats, None)
}

/// Counters plus the state of every seat, as shown on an event's page
///
/// Seats reserved by `viewer` are flagged as theirs.
pub fn detailed(meta: &EventMeta, seats: &SeatMap, viewer: Option<CustomerId>) -> EventView {
    build(meta, seats, Some(viewer))
}

/// `detail` is [`None`] for summaries and carries the viewer otherwise
fn build(meta: &EventMeta, seats: &SeatMap, detail: Option<Option<CustomerId>>) -> EventView {
    let mut ranks = Rank::ALL.map(|rank| RankView {
        total: rank.capacity(),
        remains: 0,
        price: meta.seat_price(rank),
        detail: match detail {
            Some(_) => Vec::with_capacity(rank.capacity() as usize),
            None => Vec::new(),
        },
    });
    let mut remains = 0;

    for seat in all_seats() {
        let sheet = &mut ranks[seat.rank as usize];
        let reservation = seats.get(&seat.id);
        if reservation.is_none() {
            remains += 1;
            sheet.remains += 1;
        }

        if let Some(viewer) = detail {
            sheet.detail.push(SeatView {
                num: seat.number,
                mine: reservation.is_some_and(|rv| Some(rv.customer) == viewer),
                reserved: reservation.is_some(),
                reserved_at: reservation.map(|rv| rv.reserved_at),
            });
        }
    }

    EventView {
        id: meta.id,
        title: meta.title.clone(),
        public: meta.public,
        closed: meta.closed,
        price: meta.price,
        total: TOTAL_SEATS,
        remains,
        sheets: Rank::ALL.into_iter().zip(ranks).collect(),
    }
}
