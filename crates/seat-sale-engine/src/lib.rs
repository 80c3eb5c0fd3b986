//! :rocket: Implementation of the seat sales system.
//!
//! The system consists of the [database] (an in-memory [`ReservationStore`]),
//! the [seat cache][cache], the [availability views][view], the [allocator],
//! its [coordinator] and [workers][worker], the [refresher] keeping the cache
//! warm, and the [box office][box_office] tying them together.

#![allow(rustdoc::private_intra_doc_links)]
use std::sync::Arc;
use std::thread;

use crossbeam::channel::bounded;
use seat_sale_core::{Config, ReservationStore};
use tracing::info;

mod allocator;
mod box_office;
mod cache;
mod coordinator;
mod database;
mod job;
mod refresher;
pub mod view;
mod worker;

pub use allocator::Allocator;
pub use box_office::BoxOffice;
pub use cache::{CacheState, RefreshOutcome, SeatCache, SeatMap};
pub use coordinator::Coordinator;
pub use database::Database;
use refresher::Refresher;

/// Entrypoint of the implementation
///
/// Starts the allocation workers and the background refresher reading from
/// and writing to `store`. The cache starts out uninitialized and is
/// populated by the refresher's first round or the first read, whichever
/// comes first.
///
/// Fails if a thread cannot be spawned.
pub fn launch(config: &Config, store: Arc<dyn ReservationStore>) -> std::io::Result<BoxOffice> {
    let cache = Arc::new(SeatCache::new(store.clone(), config));

    let allocator = Arc::new(Allocator::new(store.clone(), config.max_attempts));
    let coordinator = Coordinator::new(allocator, config.allocator_threads as usize)?;

    let (refresher_shutdown, shutdown_receiver) = bounded(1);
    let refresher = Refresher::new(cache.clone(), config.refresh_interval(), shutdown_receiver);
    let refresher_thread = match thread::Builder::new()
        .name("refresher".to_owned())
        .spawn(move || refresher.run())
    {
        Ok(handle) => handle,
        Err(err) => {
            coordinator.shutdown();
            return Err(err);
        }
    };

    info!(
        workers = config.allocator_threads,
        refresh_interval = ?config.refresh_interval(),
        "seat sales launched"
    );
    Ok(BoxOffice::new(
        store,
        cache,
        coordinator,
        config.request_timeout(),
        refresher_shutdown,
        refresher_thread,
    ))
}
