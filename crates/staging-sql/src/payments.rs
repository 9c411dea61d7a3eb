use crate::Error;
use chrono::{DateTime, Utc};
use lsn::Lsn;
use model::{Nullable, PaymentChange};
use sqlx::FromRow;

pub async fn insert_payment_changes_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    rows: &[PaymentChange],
) -> Result<(), Error> {
    if rows.is_empty() {
        return Ok(());
    }

    let lsn: Vec<Vec<u8>> = rows.iter().map(|r| r.lsn.as_bytes().to_vec()).collect();
    let seqval: Vec<Vec<u8>> = rows.iter().map(|r| r.seqval.as_bytes().to_vec()).collect();
    let op: Vec<i16> = rows.iter().map(|r| i16::from(r.op)).collect();
    let payment_id: Vec<i64> = rows.iter().map(|r| r.payment_id).collect();
    let order_id: Vec<Option<i64>> = rows.iter().map(|r| r.order_id.into_inner()).collect();
    let amount: Vec<Option<f64>> = rows.iter().map(|r| r.amount.into_inner()).collect();
    let paid_at: Vec<Option<DateTime<Utc>>> = rows.iter().map(|r| r.paid_at.into_inner()).collect();

    sqlx::query(
        r#"
        insert into stg_cdc_payments
            (lsn, seqval, op, payment_id, order_id, amount, paid_at, ingested_at)
        select lsn, seqval, op, payment_id, order_id, amount, paid_at, now()
        from unnest($1::bytea[], $2::bytea[], $3::smallint[], $4::bigint[],
                    $5::bigint[], $6::double precision[], $7::timestamptz[])
            as batch(lsn, seqval, op, payment_id, order_id, amount, paid_at)
        on conflict (lsn, seqval, payment_id) do nothing
        "#,
    )
    .bind(lsn)
    .bind(seqval)
    .bind(op)
    .bind(payment_id)
    .bind(order_id)
    .bind(amount)
    .bind(paid_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[derive(FromRow)]
struct Row {
    lsn: Vec<u8>,
    seqval: Vec<u8>,
    op: i16,
    payment_id: i64,
    order_id: Option<i64>,
    amount: Option<f64>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<Row> for PaymentChange {
    type Error = Error;

    fn try_from(row: Row) -> Result<Self, Error> {
        Ok(PaymentChange {
            lsn: Lsn::pad(&row.lsn)?,
            seqval: Lsn::pad(&row.seqval)?,
            op: model::Op::try_from(row.op)?,
            payment_id: row.payment_id,
            order_id: Nullable(row.order_id),
            amount: Nullable(row.amount),
            paid_at: Nullable(row.paid_at),
        })
    }
}

/// Staged payment changes recorded at or after `since`, ordered `(lsn,
/// seqval)` ascending. Mirrors `load_order_changes_window`.
pub async fn load_payment_changes_window(
    pool: &sqlx::PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<PaymentChange>, Error> {
    let rows: Vec<Row> = sqlx::query_as(
        r#"
        select lsn, seqval, op, payment_id, order_id, amount, paid_at
        from stg_cdc_payments
        where paid_at >= $1
        order by lsn, seqval
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PaymentChange::try_from).collect()
}
