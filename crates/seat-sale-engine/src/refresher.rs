//! Implementation of the background refresher

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{select, Receiver};
use tracing::{debug, trace};

use crate::cache::SeatCache;

/// Keeps the [`SeatCache`] warm by refreshing it every `interval`
pub struct Refresher {
    cache: Arc<SeatCache>,
    interval: Duration,
    shutdown: Receiver<()>,
}

impl Refresher {
    /// Create a new [`Refresher`], stopped by a message on (or the
    /// disconnection of) `shutdown`
    pub fn new(cache: Arc<SeatCache>, interval: Duration, shutdown: Receiver<()>) -> Self {
        Self {
            cache,
            interval,
            shutdown,
        }
    }

    /// The refresher's main routine
    pub fn run(&self) {
        debug!(interval = ?self.interval, "refresher started");
        loop {
            // failures are logged by the cache; the next round retries the window
            if let Ok(outcome) = self.cache.refresh_all() {
                trace!(?outcome, "background refresh");
            }
            let stop = select! {
                recv(self.shutdown) -> _ => true,
                default(self.interval) => false,
            };
            if stop {
                break;
            }
        }
        debug!("refresher stopped");
    }
}
