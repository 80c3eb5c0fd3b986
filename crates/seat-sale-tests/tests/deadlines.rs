use std::time::Duration;

use eyre::Result;
use seat_sale_core::{Rank, ReservationStore, Scope, SeatError};
use seat_sale_tests::{TestCtxBuilder, THIEF};

mod util;

#[tokio::test]
#[ntest::timeout(10_000)]
async fn test_slow_store_exceeds_deadline() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_config(|config| config.request_timeout_ms = 100)
        .build()
        .await?;
    let event = ctx.event();
    let session = ctx.api.create_user_session();

    ctx.store.delay_inserts(Some(Duration::from_millis(500)));
    let outcome = session.reserve(event, Rank::A).await?;
    assert_eq!(outcome, Err(SeatError::DeadlineExceeded));
    assert!(outcome.is_err_and(|err| err.is_server_busy()));

    // the attempt in flight still commits; only its outcome is lost
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(ctx.db.num_active(event), 1);

    ctx.store.delay_inserts(None);
    util::reserve(&session, event, Rank::A).await?;

    ctx.finish().await
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn test_expired_jobs_are_not_run() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_config(|config| {
            config.request_timeout_ms = 100;
            config.allocator_threads = 1;
        })
        .build()
        .await?;
    let event = ctx.event();
    let first = ctx.api.create_user_session();
    let second = ctx.api.create_user_session();

    // the single worker is busy with the first job until long after the
    // second one expired
    ctx.store.delay_inserts(Some(Duration::from_millis(500)));
    let (a, b) = tokio::join!(first.reserve(event, Rank::C), second.reserve(event, Rank::C));
    assert_eq!(a?, Err(SeatError::DeadlineExceeded));
    assert_eq!(b?, Err(SeatError::DeadlineExceeded));

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(
        ctx.db.num_active(event),
        1,
        "A job whose deadline passed before it started must not reserve anything."
    );

    ctx.finish().await
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn test_no_retry_after_deadline() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_config(|config| config.request_timeout_ms = 100)
        .build()
        .await?;
    let event = ctx.event();
    let session = ctx.api.create_user_session();

    // the first attempt loses its race only after the deadline passed
    ctx.store.delay_inserts(Some(Duration::from_millis(300)));
    ctx.store.steal_next_inserts(1);
    let outcome = session.reserve(event, Rank::B).await?;
    assert_eq!(outcome, Err(SeatError::DeadlineExceeded));

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(
        ctx.db.reservations_of(session.customer_id)?.is_empty(),
        "No attempt may start after the deadline."
    );
    let holders: Vec<_> = ctx
        .db
        .changes_since(Scope::Event(event), None)?
        .into_iter()
        .map(|rv| rv.customer)
        .collect();
    assert_eq!(holders, vec![THIEF]);

    ctx.finish().await
}
