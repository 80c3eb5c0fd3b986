//! Error types

use thiserror::Error;

use crate::{EventId, Rank, SeatId};

/// Failure reported by a [`ReservationStore`](crate::ReservationStore)
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or the operation failed mid-way
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The event does not exist in the store
    #[error("unknown event {0}")]
    UnknownEvent(EventId),
}

impl StoreError {
    /// Whether retrying the same operation may succeed
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Failure of a conditional insert
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InsertError {
    /// Another writer holds an active reservation for the seat
    #[error("seat {seat} of event {event} is already reserved")]
    Conflict {
        /// Event of the contested seat
        event: EventId,
        /// Contested seat
        seat: SeatId,
    },

    /// Any other store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a seat operation that did not succeed
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SeatError {
    /// The rank/number pair does not name a seat
    #[error("invalid seat {rank}-{number}")]
    InvalidSeat {
        /// Requested rank
        rank: Rank,
        /// Requested rank-local number
        number: u32,
    },

    /// The rank tag is not one of `S`, `A`, `B`, `C`
    #[error("invalid rank {0:?}")]
    InvalidRank(String),

    /// The event does not exist
    #[error("unknown event {0}")]
    UnknownEvent(EventId),

    /// The event exists but does not accept the operation (hidden or closed)
    #[error("event {0} is not available")]
    InvalidEvent(EventId),

    /// No seat of the requested rank is free
    #[error("sold out")]
    SoldOut,

    /// Every attempt lost a race or hit a store error
    #[error("gave up after {attempts} attempts")]
    AllocationExhausted {
        /// Number of attempts made
        attempts: u32,
    },

    /// Nobody holds an active reservation for the seat
    #[error("seat is not reserved")]
    NotReserved,

    /// The seat is reserved by somebody else
    #[error("seat is reserved by another customer")]
    NotPermitted,

    /// The store failed and retrying did not help or was not attempted
    #[error(transparent)]
    StoreUnavailable(StoreError),

    /// The caller's deadline elapsed before an outcome was known
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The allocation workers have been shut down
    #[error("seat service is shutting down")]
    ShuttingDown,
}

impl SeatError {
    /// Whether the error indicates load rather than a problem with the request
    ///
    /// Callers should surface these as a retryable, server-busy condition.
    #[inline]
    pub fn is_server_busy(&self) -> bool {
        matches!(
            self,
            SeatError::AllocationExhausted { .. } | SeatError::DeadlineExceeded
        )
    }
}

/// Failure of a cache refresh
///
/// The cache is left as it was; the next refresh covers the same window again.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Querying the store for changes failed
    #[error("refresh failed: {0}")]
    Store(#[from] StoreError),
}

impl From<StoreError> for SeatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownEvent(event) => SeatError::UnknownEvent(event),
            err => SeatError::StoreUnavailable(err),
        }
    }
}

impl From<CacheError> for SeatError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Store(err) => err.into(),
        }
    }
}

/// Failure to load a [`Config`](crate::Config)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`Config`](crate::Config)
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override does not parse
    #[error("invalid value {value:?} for {key}")]
    Env {
        /// Name of the environment variable
        key: String,
        /// Value found in the environment
        value: String,
    },
}
