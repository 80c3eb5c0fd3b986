//! Deterministic seat layout shared by every event

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::SeatError;

/// Numeric identifier of a seat, in `1..=TOTAL_SEATS`
pub type SeatId = u32;

/// Number of seats every event offers
pub const TOTAL_SEATS: u32 = 1000;

/// Seat rank
///
/// Variants are declared by descending price, so the derived [`Ord`] sorts
/// `S < A < B < C` and iterating [`Rank::ALL`] walks the seat ids upwards.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Rank {
    /// Seats 1 to 50
    S,
    /// Seats 51 to 200
    A,
    /// Seats 201 to 500
    B,
    /// Seats 501 to 1000
    C,
}

impl Rank {
    /// All ranks, most expensive first
    pub const ALL: [Rank; 4] = [Rank::S, Rank::A, Rank::B, Rank::C];

    /// Number of seats of this rank
    #[inline]
    pub const fn capacity(self) -> u32 {
        match self {
            Rank::S => 50,
            Rank::A => 150,
            Rank::B => 300,
            Rank::C => 500,
        }
    }

    /// Price of a seat of this rank before the event's own price is added
    #[inline]
    pub const fn base_price(self) -> i64 {
        match self {
            Rank::S => 5000,
            Rank::A => 3000,
            Rank::B => 1000,
            Rank::C => 0,
        }
    }

    /// Seat id preceding the first seat of this rank
    #[inline]
    pub const fn offset(self) -> u32 {
        match self {
            Rank::S => 0,
            Rank::A => 50,
            Rank::B => 200,
            Rank::C => 500,
        }
    }

    /// Seat ids belonging to this rank
    #[inline]
    pub fn seat_ids(self) -> std::ops::RangeInclusive<SeatId> {
        self.offset() + 1..=self.offset() + self.capacity()
    }

    /// The single-letter tag of the rank
    pub const fn as_str(self) -> &'static str {
        match self {
            Rank::S => "S",
            Rank::A => "A",
            Rank::B => "B",
            Rank::C => "C",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = SeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S" => Ok(Rank::S),
            "A" => Ok(Rank::A),
            "B" => Ok(Rank::B),
            "C" => Ok(Rank::C),
            other => Err(SeatError::InvalidRank(other.to_owned())),
        }
    }
}

impl Serialize for Rank {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// What a seat id stands for
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SeatIdentity {
    /// The seat id this identity was derived from
    pub id: SeatId,
    /// Rank of the seat
    pub rank: Rank,
    /// 1-based number of the seat within its rank
    pub number: u32,
    /// Base price of the seat
    pub base_price: i64,
}

/// Map a seat id to its rank, rank-local number and base price.
///
/// Ids beyond [`TOTAL_SEATS`] are treated as belonging to the last rank; use
/// [`seat_id_of()`] to validate externally provided coordinates.
pub fn identity_of(id: SeatId) -> SeatIdentity {
    let rank = if id > Rank::C.offset() {
        Rank::C
    } else if id > Rank::B.offset() {
        Rank::B
    } else if id > Rank::A.offset() {
        Rank::A
    } else {
        Rank::S
    };
    SeatIdentity {
        id,
        rank,
        number: id - rank.offset(),
        base_price: rank.base_price(),
    }
}

/// Inverse of [`identity_of()`].
///
/// Fails with [`SeatError::InvalidSeat`] unless `1 <= number <= capacity`.
pub fn seat_id_of(rank: Rank, number: u32) -> Result<SeatId, SeatError> {
    if number == 0 || number > rank.capacity() {
        return Err(SeatError::InvalidSeat { rank, number });
    }
    Ok(rank.offset() + number)
}

/// Iterate all seat identities ordered by rank, then number
pub fn all_seats() -> impl Iterator<Item = SeatIdentity> {
    (1..=TOTAL_SEATS).map(identity_of)
}
