use std::collections::HashSet;

use eyre::Result;
use futures::future::join_all;
use seat_sale_core::{Rank, SeatError};
use seat_sale_tests::TestCtxBuilder;

mod util;

#[tokio::test]
#[ntest::timeout(30_000)]
async fn test_no_double_booking() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_service_threads(16)
        .with_config(|config| config.allocator_threads = 16)
        .build()
        .await?;
    let event = ctx.event();
    let capacity = Rank::S.capacity() as usize;

    let sessions: Vec<_> = (0..3 * capacity)
        .map(|_| ctx.api.create_user_session())
        .collect();
    let outcomes = join_all(
        sessions
            .iter()
            .map(|session| session.reserve(event, Rank::S)),
    )
    .await;

    let mut seats = HashSet::new();
    let mut failed = 0;
    for outcome in outcomes {
        match outcome? {
            Ok(handle) => {
                assert_eq!(handle.rank, Rank::S);
                assert!(
                    seats.insert(handle.seat),
                    "Seat {} was handed out twice.",
                    handle.seat
                );
            }
            Err(SeatError::SoldOut | SeatError::AllocationExhausted { .. }) => failed += 1,
            Err(err) => panic!("Unexpected reservation failure: {err}"),
        }
    }
    assert_eq!(seats.len(), capacity, "Every seat must be sold exactly once.");
    assert_eq!(failed, 2 * capacity);
    assert_eq!(ctx.db.num_active(event), capacity as u32);

    ctx.finish().await
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn test_concurrent_reserve_and_cancel() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_service_threads(8)
        .build()
        .await?;
    let event = ctx.event();

    let sessions: Vec<_> = (0..40).map(|_| ctx.api.create_user_session()).collect();
    let rounds = sessions.iter().map(|session| async move {
        for _ in 0..5 {
            let handle = util::reserve(session, event, Rank::B).await?;
            session.release(&handle).await??;
        }
        eyre::Ok(())
    });
    for round in join_all(rounds).await {
        round?;
    }

    assert_eq!(ctx.db.num_active(event), 0);
    let summary = util::listed(&ctx, event).await?;
    assert_eq!(summary.remains, 1000);

    ctx.finish().await
}
