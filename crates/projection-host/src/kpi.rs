use crate::Error;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

/// One row of the aggregate-by-window projection: a `(bucket, segment)`
/// grain cell (SPEC_FULL.md §4.7 step 6).
#[derive(Debug, Clone, PartialEq)]
pub struct KpiRow {
    pub bucket: DateTime<Utc>,
    pub segment: String,
    pub order_count: i64,
    pub order_sum: f64,
    pub payment_count: i64,
    pub paid_sum: f64,
}

/// Collapses staged orders/customers/payments to their latest non-deleted
/// state, enriches with customer segment (absent segment becomes the
/// literal `UNKNOWN`), buckets both streams to the minute, and full-outer
/// joins on `(bucket, segment)` so a minute with orders but no payments
/// yet (or vice versa) still produces one row.
pub fn compute(conn: &Connection, window_start: DateTime<Utc>) -> Result<Vec<KpiRow>, Error> {
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
        ),
        payments_ranked AS (
            SELECT *, ROW_NUMBER() OVER (
                PARTITION BY payment_id ORDER BY lsn DESC, seqval DESC
            ) AS rnk
            FROM stg_payments WHERE op <> 3
        ),
        payments_latest AS (
            SELECT * FROM payments_ranked WHERE rnk = 1 AND op <> 1
        ),
        orders_enriched AS (
            SELECT
                strftime('%Y-%m-%dT%H:%M:00Z', o.created_at) AS bucket,
                COALESCE(c.segment, 'UNKNOWN') AS segment,
                o.amount AS amount
            FROM orders_latest o
            LEFT JOIN customers_latest c ON c.customer_id = o.customer_id
            WHERE o.created_at >= ?1
        ),
        payments_enriched AS (
            SELECT
                strftime('%Y-%m-%dT%H:%M:00Z', p.paid_at) AS bucket,
                COALESCE(c.segment, 'UNKNOWN') AS segment,
                p.amount AS amount
            FROM payments_latest p
            LEFT JOIN orders_latest o ON o.order_id = p.order_id
            LEFT JOIN customers_latest c ON c.customer_id = o.customer_id
            WHERE p.paid_at >= ?1
        ),
        order_agg AS (
            SELECT bucket, segment, COUNT(*) AS order_count, SUM(amount) AS order_sum
            FROM orders_enriched GROUP BY bucket, segment
        ),
        payment_agg AS (
            SELECT bucket, segment, COUNT(*) AS payment_count, SUM(amount) AS paid_sum
            FROM payments_enriched GROUP BY bucket, segment
        )
        SELECT
            COALESCE(o.bucket, p.bucket) AS bucket,
            COALESCE(o.segment, p.segment) AS segment,
            COALESCE(o.order_count, 0) AS order_count,
            COALESCE(o.order_sum, 0.0) AS order_sum,
            COALESCE(p.payment_count, 0) AS payment_count,
            COALESCE(p.paid_sum, 0.0) AS paid_sum
        FROM order_agg o
        FULL OUTER JOIN payment_agg p ON o.bucket = p.bucket AND o.segment = p.segment
        ORDER BY bucket, segment
        "#,
    )?;

    let window_start = window_start.to_rfc3339();
    let rows = stmt
        .query_map([window_start], |row| {
            let bucket: String = row.get(0)?;
            Ok((
                bucket,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, f64>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(bucket, segment, order_count, order_sum, payment_count, paid_sum)| {
            Ok(KpiRow {
                bucket: DateTime::parse_from_rfc3339(&bucket)
                    .map_err(|_| Error::Timestamp(bucket.clone()))?
                    .with_timezone(&Utc),
                segment,
                order_count,
                order_sum,
                payment_count,
                paid_sum,
            })
        })
        .collect()
}
