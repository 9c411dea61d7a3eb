use crate::Error;
use lsn::Lsn;
use model::{CustomerChange, Nullable};
use sqlx::FromRow;

pub async fn insert_customer_changes_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    rows: &[CustomerChange],
) -> Result<(), Error> {
    if rows.is_empty() {
        return Ok(());
    }

    let lsn: Vec<Vec<u8>> = rows.iter().map(|r| r.lsn.as_bytes().to_vec()).collect();
    let seqval: Vec<Vec<u8>> = rows.iter().map(|r| r.seqval.as_bytes().to_vec()).collect();
    let op: Vec<i16> = rows.iter().map(|r| i16::from(r.op)).collect();
    let customer_id: Vec<i64> = rows.iter().map(|r| r.customer_id).collect();
    let segment: Vec<Option<String>> = rows.iter().map(|r| r.segment.clone().into_inner()).collect();

    sqlx::query(
        r#"
        insert into stg_cdc_customers (lsn, seqval, op, customer_id, segment, ingested_at)
        select lsn, seqval, op, customer_id, segment, now()
        from unnest($1::bytea[], $2::bytea[], $3::smallint[], $4::bigint[], $5::text[])
            as batch(lsn, seqval, op, customer_id, segment)
        on conflict (lsn, seqval, customer_id) do nothing
        "#,
    )
    .bind(lsn)
    .bind(seqval)
    .bind(op)
    .bind(customer_id)
    .bind(segment)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[derive(FromRow)]
struct Row {
    lsn: Vec<u8>,
    seqval: Vec<u8>,
    op: i16,
    customer_id: i64,
    segment: Option<String>,
}

impl TryFrom<Row> for CustomerChange {
    type Error = Error;

    fn try_from(row: Row) -> Result<Self, Error> {
        Ok(CustomerChange {
            lsn: Lsn::pad(&row.lsn)?,
            seqval: Lsn::pad(&row.seqval)?,
            op: model::Op::try_from(row.op)?,
            customer_id: row.customer_id,
            segment: Nullable(row.segment),
        })
    }
}

/// All staged customer changes, ordered `(lsn, seqval)` ascending. The
/// latest-state worker always loads the full table: customer segment is a
/// small, slowly-changing dimension (SPEC_FULL.md §4.8 step 3).
pub async fn load_customer_changes_all(pool: &sqlx::PgPool) -> Result<Vec<CustomerChange>, Error> {
    let rows: Vec<Row> = sqlx::query_as(
        r#"
        select lsn, seqval, op, customer_id, segment
        from stg_cdc_customers
        order by lsn, seqval
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CustomerChange::try_from).collect()
}
