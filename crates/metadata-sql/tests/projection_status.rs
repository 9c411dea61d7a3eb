//! Scenario 6 from SPEC_FULL.md §8 at the metadata layer: a projection
//! cycle failure flips status to ERROR with a non-empty truncated
//! message, and a later successful cycle clears it back to OK without
//! touching `as_of_lsn`/`last_error` of any other projection.

use lsn::Lsn;
use metadata_sql::Status;
use model::{Capture, Projection};

#[sqlx::test(migrations = "../../migrations")]
async fn error_then_recovery_round_trips_through_status(pool: sqlx::PgPool) -> sqlx::Result<()> {
    metadata_sql::ensure_bootstrap(&pool, "source1", &Capture::ALL, &[Projection::OrdersKpi])
        .await
        .unwrap();

    metadata_sql::mark_projection_error(&pool, Projection::OrdersKpi, "embedded sql host panicked")
        .await;

    let (status, last_error): (Status, Option<String>) = sqlx::query_as(
        "select status, last_error from ctl_projection_metadata where projection_name = $1",
    )
    .bind(Projection::OrdersKpi.as_str())
    .fetch_one(&pool)
    .await?;
    assert_eq!(status, Status::Error);
    assert_eq!(last_error.as_deref(), Some("embedded sql host panicked"));

    let mut tx = pool.begin().await?;
    metadata_sql::upsert_projection_metadata_tx(
        &mut tx,
        Projection::OrdersKpi,
        Lsn::from_hex("0x0a").unwrap(),
        Status::Ok,
        None,
    )
    .await
    .unwrap();
    tx.commit().await?;

    let (status, last_error): (Status, Option<String>) = sqlx::query_as(
        "select status, last_error from ctl_projection_metadata where projection_name = $1",
    )
    .bind(Projection::OrdersKpi.as_str())
    .fetch_one(&pool)
    .await?;
    assert_eq!(status, Status::Ok);
    assert_eq!(last_error, None);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn long_errors_are_truncated_before_they_reach_the_fixed_width_column(
    pool: sqlx::PgPool,
) -> sqlx::Result<()> {
    metadata_sql::ensure_bootstrap(&pool, "source1", &Capture::ALL, &[Projection::OrdersLatest])
        .await
        .unwrap();

    let long_message = "x".repeat(metadata_sql::LAST_ERROR_MAX_LEN + 1_000);
    metadata_sql::mark_projection_error(&pool, Projection::OrdersLatest, &long_message).await;

    let last_error: Option<String> = sqlx::query_scalar(
        "select last_error from ctl_projection_metadata where projection_name = $1",
    )
    .bind(Projection::OrdersLatest.as_str())
    .fetch_one(&pool)
    .await?;
    assert_eq!(
        last_error.map(|s| s.len()),
        Some(metadata_sql::LAST_ERROR_MAX_LEN)
    );

    Ok(())
}
