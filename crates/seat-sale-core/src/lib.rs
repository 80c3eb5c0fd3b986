//! 🏗 Vocabulary of the seat sales system: seats, records, errors, and the
//! interfaces between the engine, its store and its callers.
#![warn(missing_docs)]

mod config;
mod error;
mod record;
mod seat;
mod service;
mod store;

pub use config::Config;
pub use error::{CacheError, ConfigError, InsertError, SeatError, StoreError};
pub use record::{CustomerId, EventId, EventMeta, ReservationHandle, ReservationId, ReservationRecord};
pub use seat::{all_seats, identity_of, seat_id_of, Rank, SeatId, SeatIdentity, TOTAL_SEATS};
pub use service::{
    CustomerActivity, EventView, PublicEventView, RankView, ReservationView, SeatService, SeatView,
};
pub use store::{ReservationStore, Scope, StoreResult};
