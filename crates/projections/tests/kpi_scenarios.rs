//! Scenarios 3 and 4 from SPEC_FULL.md §8, run against a real Postgres
//! instance via `sqlx::test`'s per-test database.

use chrono::{Duration, Timelike, Utc};
use lsn::Lsn;
use model::{Capture, CustomerChange, Nullable, Op, OrderChange, PaymentChange, Projection};

fn order(lsn: &str, order_id: i64, customer_id: i64, amount: f64) -> OrderChange {
    OrderChange {
        lsn: Lsn::from_hex(lsn).unwrap(),
        seqval: Lsn::from_hex("0x01").unwrap(),
        op: Op::Insert,
        order_id,
        customer_id: Nullable::some(customer_id),
        amount: Nullable::some(amount),
        status: Nullable::some("open".to_string()),
        created_at: Nullable::some(Utc::now()),
    }
}

fn customer(lsn: &str, customer_id: i64, segment: &str) -> CustomerChange {
    CustomerChange {
        lsn: Lsn::from_hex(lsn).unwrap(),
        seqval: Lsn::from_hex("0x01").unwrap(),
        op: Op::Insert,
        customer_id,
        segment: Nullable::some(segment.to_string()),
    }
}

fn payment(lsn: &str, payment_id: i64, order_id: i64, amount: f64) -> PaymentChange {
    PaymentChange {
        lsn: Lsn::from_hex(lsn).unwrap(),
        seqval: Lsn::from_hex("0x01").unwrap(),
        op: Op::Insert,
        payment_id,
        order_id: Nullable::some(order_id),
        amount: Nullable::some(amount),
        paid_at: Nullable::some(Utc::now()),
    }
}

fn floor_to_minute(dt: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
    dt - Duration::seconds(dt.second() as i64) - Duration::nanoseconds(dt.nanosecond() as i64)
}

async fn seed_watermark(pool: &sqlx::PgPool, capture: Capture, lsn: Lsn) {
    let mut tx = pool.begin().await.unwrap();
    metadata_sql::update_ingestion_watermark_tx(&mut tx, "source1", capture, lsn)
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn windowed_recompute_ignores_old_data(pool: sqlx::PgPool) -> sqlx::Result<()> {
    metadata_sql::ensure_bootstrap(&pool, "source1", &Capture::ALL, &[Projection::OrdersKpi])
        .await
        .unwrap();

    let lsn = Lsn::from_hex("0x05").unwrap();
    seed_watermark(&pool, Capture::Orders, lsn).await;
    seed_watermark(&pool, Capture::Customers, lsn).await;
    seed_watermark(&pool, Capture::Payments, lsn).await;

    let mut tx = pool.begin().await?;
    staging_sql::insert_order_changes_tx(&mut tx, &[order("0x05", 1, 42, 100.0)])
        .await
        .unwrap();
    staging_sql::insert_customer_changes_tx(&mut tx, &[customer("0x01", 42, "SMB")])
        .await
        .unwrap();
    tx.commit().await?;

    let recompute_window = Duration::minutes(15);
    let window_start = floor_to_minute(Utc::now()) - recompute_window;
    let old_bucket = window_start - Duration::minutes(60);

    sqlx::query(
        r#"
        insert into proj_orders_kpi (bucket, segment, order_count, order_sum, payment_count, paid_sum)
        values ($1, 'SMB', 5, 500.0, 2, 20.0)
        "#,
    )
    .bind(old_bucket)
    .execute(&pool)
    .await?;

    let outcome = projections::run_kpi_cycle(&pool, "source1", recompute_window)
        .await
        .unwrap();
    assert!(matches!(outcome, projections::CycleOutcome::Built { .. }));

    let old_row: (i64,) = sqlx::query_as(
        "select order_count from proj_orders_kpi where bucket = $1 and segment = 'SMB'",
    )
    .bind(old_bucket)
    .fetch_one(&pool)
    .await?;
    assert_eq!(old_row.0, 5, "pre-existing row outside the window must be untouched");

    let new_bucket = floor_to_minute(Utc::now());
    let new_row: (i64, f64, i64, f64) = sqlx::query_as(
        "select order_count, order_sum, payment_count, paid_sum from proj_orders_kpi
         where bucket = $1 and segment = 'SMB'",
    )
    .bind(new_bucket)
    .fetch_one(&pool)
    .await?;
    assert_eq!(new_row, (1, 100.0, 0, 0.0));

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn cross_stream_cutoff_excludes_changes_past_the_slowest_capture(
    pool: sqlx::PgPool,
) -> sqlx::Result<()> {
    metadata_sql::ensure_bootstrap(&pool, "source1", &Capture::ALL, &[Projection::OrdersKpi])
        .await
        .unwrap();

    seed_watermark(&pool, Capture::Orders, Lsn::from_hex("0x05").unwrap()).await;
    seed_watermark(&pool, Capture::Customers, Lsn::from_hex("0x03").unwrap()).await;
    seed_watermark(&pool, Capture::Payments, Lsn::from_hex("0x04").unwrap()).await;

    let mut tx = pool.begin().await?;
    staging_sql::insert_order_changes_tx(
        &mut tx,
        &[order("0x01", 1, 42, 10.0), order("0x05", 2, 42, 999.0)],
    )
    .await
    .unwrap();
    staging_sql::insert_customer_changes_tx(&mut tx, &[customer("0x01", 42, "SMB")])
        .await
        .unwrap();
    staging_sql::insert_payment_changes_tx(
        &mut tx,
        &[payment("0x02", 1, 1, 10.0), payment("0x04", 2, 2, 999.0)],
    )
    .await
    .unwrap();
    tx.commit().await?;

    let outcome = projections::run_kpi_cycle(&pool, "source1", Duration::minutes(15))
        .await
        .unwrap();
    let projections::CycleOutcome::Built { as_of_lsn, .. } = outcome else {
        panic!("expected a build");
    };
    assert_eq!(as_of_lsn, Lsn::from_hex("0x03").unwrap());

    let checkpoints =
        metadata_sql::get_projection_checkpoints(&pool, Projection::OrdersKpi, Capture::ALL.as_slice())
            .await
            .unwrap();
    for capture in [Capture::Orders, Capture::Customers, Capture::Payments] {
        assert_eq!(checkpoints[&capture], Lsn::from_hex("0x03").unwrap());
    }

    let bucket = floor_to_minute(Utc::now());
    let row: (i64, f64, i64, f64) = sqlx::query_as(
        "select order_count, order_sum, payment_count, paid_sum from proj_orders_kpi
         where bucket = $1 and segment = 'SMB'",
    )
    .bind(bucket)
    .fetch_one(&pool)
    .await?;
    assert_eq!(
        row,
        (1, 10.0, 1, 10.0),
        "order/payment past the cutoff lsn must not be reflected in the rebuild"
    );

    Ok(())
}
