use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use eyre::Result;
use seat_sale_core::{Config, EventId};
use seat_sale_engine::{CacheState, Database, SeatCache};
use tracing_subscriber::EnvFilter;

mod api;
mod flaky;
pub use api::{Api, ApiResult, UserSession};
pub use flaky::{FlakyStore, THIEF};

/// An event created before the seat sales system is launched
#[derive(Clone, Debug)]
pub struct NewEvent {
    pub title: String,
    pub public: bool,
    pub price: i64,
}

pub struct TestCtxBuilder {
    /// Configuration the seat sales system is launched with
    pub config: Config,
    /// Count of service threads calling into the box office
    pub service_threads: u16,
    /// Events to create, in order
    pub events: Vec<NewEvent>,
    /// How far the store's clock runs ahead of the wall clock
    pub clock_offset: TimeDelta,
}

impl TestCtxBuilder {
    /// Create a new test context builder initialized with environment defaults
    ///
    /// `SEAT_SALE_*` variables override the default configuration and
    /// `RUST_LOG` selects the log output (default: warnings).
    pub fn from_env() -> Result<Self> {
        init_logging();

        let mut config = Config::default();
        config.apply_env()?;

        Ok(TestCtxBuilder {
            config,
            service_threads: 4,
            events: Vec::new(),
            clock_offset: TimeDelta::zero(),
        })
    }

    /// Adjust the configuration
    pub fn with_config(mut self, adjust: impl FnOnce(&mut Config)) -> Self {
        adjust(&mut self.config);
        self
    }

    /// Set the number of service threads to use
    pub fn with_service_threads(mut self, threads: u16) -> Self {
        assert_ne!(threads, 0);
        self.service_threads = threads;
        self
    }

    /// Add an event to create before launching
    pub fn with_event(mut self, title: &str, public: bool, price: i64) -> Self {
        self.events.push(NewEvent {
            title: title.to_owned(),
            public,
            price,
        });
        self
    }

    /// Let the store's clock run `offset` ahead of (or, if negative, behind)
    /// the wall clock
    pub fn with_clock_offset(mut self, offset: TimeDelta) -> Self {
        self.clock_offset = offset;
        self
    }

    /// Build the test context
    ///
    /// Without any configured event a single public one is created. Returns
    /// once the background refresher has populated the cache.
    pub async fn build(mut self) -> Result<TestCtx> {
        if self.events.is_empty() {
            self = self.with_event("Opening night", true, 1_000);
        }

        let db = Arc::new(Database::with_clock_offset(self.clock_offset));
        let events = self
            .events
            .iter()
            .map(|new| db.create_event(new.title.as_str(), new.public, new.price))
            .collect();
        let store = Arc::new(FlakyStore::new(db.clone()));

        let (frontend, api) =
            api::mock::start(self.service_threads, self.config, store.clone()).await?;

        // the refresher's first round is the only refresh so far; once it is
        // done, tests control when the cache is refreshed
        let cache = frontend.cache();
        while cache.state() == CacheState::Uninitialized {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        Ok(TestCtx {
            api,
            frontend,
            db,
            store,
            events,
            config: self.config,
            drop_bomb: DropBomb,
        })
    }
}

/// Install the log subscriber once per test binary
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Test context
pub struct TestCtx {
    /// API allowing to interact with the seat sales system
    pub api: Api,
    frontend: api::mock::MockFrontend,
    /// The store behind the fault injection
    pub db: Arc<Database>,
    /// The store as seen by the seat sales system
    pub store: Arc<FlakyStore>,
    /// Ids of the events created by the builder, in order
    pub events: Vec<EventId>,
    /// Configuration the system was launched with
    pub config: Config,

    drop_bomb: DropBomb,
}

impl TestCtx {
    /// Id of the first event
    pub fn event(&self) -> EventId {
        self.events[0]
    }

    /// The seat cache of the running system
    pub fn cache(&self) -> Arc<SeatCache> {
        self.frontend.cache()
    }

    /// Shut down the seat sales system and finish the test
    pub async fn finish(self) -> Result<()> {
        std::mem::forget(self.drop_bomb);
        drop(self.api);
        self.frontend.shutdown().await
    }
}

struct DropBomb;

impl Drop for DropBomb {
    fn drop(&mut self) {
        eprintln!("@TestAuthor: You should call `ctx.finish().await` to shut the seat sales system down");
    }
}
