use crate::Error;
use chrono::{DateTime, Utc};
use lsn::Lsn;
use model::{Nullable, OrderChange};
use sqlx::FromRow;

/// Idempotently appends `rows` to `stg_cdc_orders`. Rows whose `(lsn,
/// seqval, order_id)` already exists are skipped; batches may be retried
/// freely after a crash.
pub async fn insert_order_changes_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    rows: &[OrderChange],
) -> Result<(), Error> {
    if rows.is_empty() {
        return Ok(());
    }

    let lsn: Vec<Vec<u8>> = rows.iter().map(|r| r.lsn.as_bytes().to_vec()).collect();
    let seqval: Vec<Vec<u8>> = rows.iter().map(|r| r.seqval.as_bytes().to_vec()).collect();
    let op: Vec<i16> = rows.iter().map(|r| i16::from(r.op)).collect();
    let order_id: Vec<i64> = rows.iter().map(|r| r.order_id).collect();
    let customer_id: Vec<Option<i64>> = rows.iter().map(|r| r.customer_id.into_inner()).collect();
    let amount: Vec<Option<f64>> = rows.iter().map(|r| r.amount.into_inner()).collect();
    let status: Vec<Option<String>> = rows.iter().map(|r| r.status.clone().into_inner()).collect();
    let created_at: Vec<Option<DateTime<Utc>>> =
        rows.iter().map(|r| r.created_at.into_inner()).collect();

    sqlx::query(
        r#"
        insert into stg_cdc_orders
            (lsn, seqval, op, order_id, customer_id, amount, status, created_at, ingested_at)
        select lsn, seqval, op, order_id, customer_id, amount, status, created_at, now()
        from unnest($1::bytea[], $2::bytea[], $3::smallint[], $4::bigint[],
                    $5::bigint[], $6::double precision[], $7::text[], $8::timestamptz[])
            as batch(lsn, seqval, op, order_id, customer_id, amount, status, created_at)
        on conflict (lsn, seqval, order_id) do nothing
        "#,
    )
    .bind(lsn)
    .bind(seqval)
    .bind(op)
    .bind(order_id)
    .bind(customer_id)
    .bind(amount)
    .bind(status)
    .bind(created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[derive(FromRow)]
struct Row {
    lsn: Vec<u8>,
    seqval: Vec<u8>,
    op: i16,
    order_id: i64,
    customer_id: Option<i64>,
    amount: Option<f64>,
    status: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<Row> for OrderChange {
    type Error = Error;

    fn try_from(row: Row) -> Result<Self, Error> {
        Ok(OrderChange {
            lsn: Lsn::pad(&row.lsn)?,
            seqval: Lsn::pad(&row.seqval)?,
            op: model::Op::try_from(row.op)?,
            order_id: row.order_id,
            customer_id: Nullable(row.customer_id),
            amount: Nullable(row.amount),
            status: Nullable(row.status),
            created_at: Nullable(row.created_at),
        })
    }
}

/// All staged order changes, ordered `(lsn, seqval)` ascending.
pub async fn load_order_changes_all(pool: &sqlx::PgPool) -> Result<Vec<OrderChange>, Error> {
    let rows: Vec<Row> = sqlx::query_as(
        r#"
        select lsn, seqval, op, order_id, customer_id, amount, status, created_at
        from stg_cdc_orders
        order by lsn, seqval
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(OrderChange::try_from).collect()
}

/// Staged order changes ingested at or after `since`, ordered `(lsn,
/// seqval)` ascending. Used by the aggregate-window worker to bound the
/// recompute window (SPEC_FULL.md §4.7 step 5).
pub async fn load_order_changes_window(
    pool: &sqlx::PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<OrderChange>, Error> {
    let rows: Vec<Row> = sqlx::query_as(
        r#"
        select lsn, seqval, op, order_id, customer_id, amount, status, created_at
        from stg_cdc_orders
        where created_at >= $1
        order by lsn, seqval
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(OrderChange::try_from).collect()
}
