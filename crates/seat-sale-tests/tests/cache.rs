use std::collections::HashSet;

use chrono::TimeDelta;
use eyre::Result;
use seat_sale_core::{CacheError, Rank, ReservationStore, SeatError, StoreError};
use seat_sale_engine::{CacheState, RefreshOutcome};
use seat_sale_tests::TestCtxBuilder;

mod util;

/// Keeps the background refresher out of the way after its first round
const QUIET: u64 = 60_000;

#[tokio::test]
#[ntest::timeout(10_000)]
async fn test_refresh_tracks_store() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_config(|config| config.refresh_interval_ms = QUIET)
        .build()
        .await?;
    let event = ctx.event();
    let cache = ctx.cache();
    let session = ctx.api.create_user_session();

    cache.refresh_all()?;
    assert_eq!(cache.state(), CacheState::Populated);
    assert!(cache.snapshot(event).is_empty());

    let mut handles = Vec::new();
    for rank in [Rank::S, Rank::B, Rank::C] {
        handles.push(util::reserve(&session, event, rank).await?);
    }
    assert_eq!(cache.refresh_all()?, RefreshOutcome::Refreshed { changes: 3 });
    let snapshot = cache.snapshot(event);
    let seats: HashSet<_> = snapshot.keys().copied().collect();
    assert_eq!(seats, handles.iter().map(|handle| handle.seat).collect());
    assert!(snapshot
        .values()
        .all(|rv| rv.customer == session.customer_id && rv.is_active()));

    session.release(&handles[1]).await??;
    cache.refresh_all()?;
    let snapshot = cache.snapshot(event);
    assert_eq!(snapshot.len(), 2);
    assert!(
        !snapshot.contains_key(&handles[1].seat),
        "A canceled reservation must leave the cache."
    );

    // unknown events look empty
    assert!(cache.snapshot(4242).is_empty());

    ctx.finish().await
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn test_repeated_refresh_changes_nothing() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_config(|config| config.refresh_interval_ms = QUIET)
        .build()
        .await?;
    let event = ctx.event();
    let cache = ctx.cache();
    let session = ctx.api.create_user_session();

    util::reserve(&session, event, Rank::A).await?;
    cache.refresh_all()?;
    let first = cache.snapshot(event);
    let watermark = cache.watermark();
    cache.refresh_all()?;
    assert_eq!(cache.snapshot(event), first);
    assert!(cache.watermark() >= watermark);

    ctx.finish().await
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn test_debounced_refresh_is_skipped() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_config(|config| {
            config.refresh_interval_ms = QUIET;
            config.refresh_debounce_ms = QUIET;
        })
        .build()
        .await?;
    let event = ctx.event();
    let cache = ctx.cache();
    let session = ctx.api.create_user_session();

    cache.refresh_all()?;
    assert_eq!(cache.refresh_all()?, RefreshOutcome::Skipped);

    let handle = util::reserve(&session, event, Rank::A).await?;
    assert_eq!(cache.refresh_all()?, RefreshOutcome::Skipped);
    assert_eq!(cache.refresh_event(event)?, RefreshOutcome::Skipped);
    assert!(cache.snapshot(event).is_empty());

    // a reset forces the next refresh through
    cache.reset();
    assert_eq!(cache.state(), CacheState::Uninitialized);
    assert_eq!(cache.refresh_all()?, RefreshOutcome::Refreshed { changes: 1 });
    assert!(cache.snapshot(event).contains_key(&handle.seat));

    ctx.finish().await
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn test_refresh_single_event() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_config(|config| config.refresh_interval_ms = QUIET)
        .with_event("Matinee", true, 0)
        .with_event("Evening", true, 0)
        .build()
        .await?;
    let (matinee, evening) = (ctx.events[0], ctx.events[1]);
    let cache = ctx.cache();
    let session = ctx.api.create_user_session();

    cache.refresh_all()?;
    let first = util::reserve(&session, matinee, Rank::C).await?;
    let second = util::reserve(&session, evening, Rank::C).await?;

    assert_eq!(
        cache.refresh_event(matinee)?,
        RefreshOutcome::Refreshed { changes: 1 }
    );
    assert!(cache.snapshot(matinee).contains_key(&first.seat));
    assert!(
        cache.snapshot(evening).is_empty(),
        "Refreshing one event must not touch the others."
    );

    cache.refresh_all()?;
    assert!(cache.snapshot(evening).contains_key(&second.seat));

    // an uninitialized cache is populated completely
    cache.reset();
    cache.refresh_event(matinee)?;
    assert_eq!(cache.state(), CacheState::Populated);
    assert!(cache.snapshot(evening).contains_key(&second.seat));

    ctx.finish().await
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn test_stale_cancellation_is_ignored() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_config(|config| config.refresh_interval_ms = QUIET)
        .build()
        .await?;
    let event = ctx.event();
    let cache = ctx.cache();
    let first = ctx.api.create_user_session();
    let second = ctx.api.create_user_session();

    let handle = util::reserve(&first, event, Rank::S).await?;
    cache.refresh_all()?;

    // the seat changes hands between two refreshes
    first.release(&handle).await??;
    let id = ctx
        .db
        .insert_reservation(event, handle.seat, second.customer_id, 0)?;

    assert_eq!(cache.refresh_all()?, RefreshOutcome::Refreshed { changes: 2 });
    let snapshot = cache.snapshot(event);
    let cached = &snapshot[&handle.seat];
    assert_eq!(cached.id, id);
    assert_eq!(cached.customer, second.customer_id);

    // within the safety skew both records come back; reported newest first,
    // the old cancellation arrives after the new reservation is cached
    ctx.store.reverse_changes(true);
    assert_eq!(cache.refresh_all()?, RefreshOutcome::Refreshed { changes: 2 });
    let snapshot = cache.snapshot(event);
    assert_eq!(
        snapshot.get(&handle.seat).map(|cached| cached.id),
        Some(id),
        "A cancellation of an older record must not free the seat."
    );

    ctx.finish().await
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn test_safety_skew_covers_lagging_store() -> Result<()> {
    for (skew_ms, covered) in [(10_000, true), (0, false)] {
        let ctx = TestCtxBuilder::from_env()?
            .with_config(|config| {
                config.refresh_interval_ms = QUIET;
                config.safety_skew_ms = skew_ms;
            })
            .with_clock_offset(TimeDelta::seconds(-5))
            .build()
            .await?;
        let event = ctx.event();
        let cache = ctx.cache();
        let session = ctx.api.create_user_session();

        cache.refresh_all()?;
        // stamped five seconds before the refresh above started
        let handle = util::reserve(&session, event, Rank::B).await?;
        cache.refresh_all()?;
        assert_eq!(
            cache.snapshot(event).contains_key(&handle.seat),
            covered,
            "With a skew of {skew_ms}ms the reservation must {}be observed.",
            if covered { "" } else { "not " }
        );

        // a full scan never misses anything
        cache.reset();
        cache.refresh_all()?;
        assert!(cache.snapshot(event).contains_key(&handle.seat));

        ctx.finish().await?;
    }
    Ok(())
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn test_failed_refresh_keeps_stale_projection() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_config(|config| config.refresh_interval_ms = QUIET)
        .build()
        .await?;
    let event = ctx.event();
    let cache = ctx.cache();
    let session = ctx.api.create_user_session();

    let first = util::reserve(&session, event, Rank::A).await?;
    cache.refresh_all()?;
    let watermark = cache.watermark();

    ctx.store.fail_refreshes(true);
    let second = util::reserve(&session, event, Rank::A).await?;
    assert!(matches!(
        cache.refresh_all(),
        Err(CacheError::Store(StoreError::Unavailable(_)))
    ));
    assert_eq!(cache.watermark(), watermark, "A failed refresh must not advance the watermark.");
    assert!(cache.snapshot(event).contains_key(&first.seat));
    assert!(!cache.snapshot(event).contains_key(&second.seat));

    // reads keep working from the stale projection
    let summary = util::listed(&ctx, event).await?;
    assert_eq!(summary.remains, 999);
    session.event(event).await??;

    ctx.store.fail_refreshes(false);
    cache.refresh_all()?;
    assert!(cache.snapshot(event).contains_key(&second.seat));
    assert!(cache.watermark() > watermark);

    // without any projection there is nothing to serve
    cache.reset();
    ctx.store.fail_refreshes(true);
    assert!(matches!(
        ctx.api.list_events(false).await?,
        Err(SeatError::StoreUnavailable(StoreError::Unavailable(_)))
    ));
    assert_eq!(cache.state(), CacheState::Uninitialized);
    ctx.store.fail_refreshes(false);

    ctx.finish().await
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn test_reinitialize() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_config(|config| config.refresh_interval_ms = QUIET)
        .build()
        .await?;
    let event = ctx.event();
    let cache = ctx.cache();
    let session = ctx.api.create_user_session();

    let handle = util::reserve(&session, event, Rank::C).await?;
    ctx.api.reinitialize().await??;
    assert_eq!(cache.state(), CacheState::Populated);
    assert_eq!(cache.snapshot(event).len(), 1);
    assert!(cache.snapshot(event).contains_key(&handle.seat));
    assert_eq!(ctx.db.reservations_of(session.customer_id)?.len(), 1);

    ctx.finish().await
}
