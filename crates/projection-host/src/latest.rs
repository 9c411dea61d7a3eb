use crate::Error;
use chrono::{DateTime, Utc};
use lsn::Lsn;
use rusqlite::Connection;

/// One row of the latest-state projection: current column values for a
/// single `order_id`, plus the source LSN the row reflects (SPEC_FULL.md
/// §4.8 step 4).
#[derive(Debug, Clone, PartialEq)]
pub struct LatestStateRow {
    pub order_id: i64,
    pub customer_id: Option<i64>,
    pub segment: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub source_lsn: Lsn,
}

/// Collapses staged orders to their latest non-deleted state and left
/// joins the customer's latest segment, leaving it `NULL` (unlike the KPI
/// worker) when the customer is absent or itself deleted.
pub fn compute(conn: &Connection) -> Result<Vec<LatestStateRow>, Error> {
    let mut stmt = conn.prepare(
        r#"
        WITH orders_ranked AS (
            SELECT *, ROW_NUMBER() OVER (
                PARTITION BY order_id ORDER BY lsn DESC, seqval DESC
            ) AS rnk
            FROM stg_orders WHERE op <> 3
        ),
        orders_latest AS (
            SELECT * FROM orders_ranked WHERE rnk = 1 AND op <> 1
        ),
        customers_ranked AS (
            SELECT *, ROW_NUMBER() OVER (
                PARTITION BY customer_id ORDER BY lsn DESC, seqval DESC
            ) AS rnk
            FROM stg_customers WHERE op <> 3
        ),
        customers_latest AS (
            SELECT * FROM customers_ranked WHERE rnk = 1 AND op <> 1
        )
        SELECT
            o.order_id, o.customer_id, c.segment, o.amount, o.status, o.created_at, o.lsn
        FROM orders_latest o
        LEFT JOIN customers_latest c ON c.customer_id = o.customer_id
        ORDER BY o.order_id
        "#,
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Vec<u8>>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(order_id, customer_id, segment, amount, status, created_at, lsn)| {
                let created_at = created_at
                    .map(|value| {
                        DateTime::parse_from_rfc3339(&value)
                            .map(|dt| dt.with_timezone(&Utc))
                            .map_err(|_| Error::Timestamp(value))
                    })
                    .transpose()?;

                Ok(LatestStateRow {
                    order_id,
                    customer_id,
                    segment,
                    amount,
                    status,
                    created_at,
                    source_lsn: Lsn::pad(&lsn)?,
                })
            },
        )
        .collect()
}
