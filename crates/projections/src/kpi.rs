use crate::{common, CycleOutcome, Error};
use chrono::{DateTime, Duration, Timelike, Utc};
use metadata_sql::Status;
use model::Projection;
use projection_host::Host;

/// One aggregate-window recompute cycle (SPEC_FULL.md §4.7).
pub async fn run_cycle(
    pool: &sqlx::PgPool,
    source_name: &str,
    recompute_window: Duration,
) -> Result<CycleOutcome, Error> {
    let projection = Projection::OrdersKpi;
    let bound = projection.bound_captures();

    let Some(cutoff) = common::compute_cutoff(pool, source_name, projection).await? else {
        return Ok(CycleOutcome::NothingToDo);
    };

    let checkpoints = metadata_sql::get_projection_checkpoints(pool, projection, bound).await?;
    if !common::has_any_deltas(pool, &checkpoints, cutoff).await? {
        return Ok(CycleOutcome::NothingToDo);
    }

    let window_start = floor_to_minute(Utc::now()) - recompute_window;

    // `cutoff` is the frontier this cycle committed to at step 1; rows
    // ingested after it (even if already staged by the time we load) must
    // not leak into the output (SPEC_FULL.md §8 "Cutoff safety").
    let orders: Vec<_> = staging_sql::load_order_changes_window(pool, window_start)
        .await?
        .into_iter()
        .filter(|r| r.lsn <= cutoff)
        .collect();
    let customers: Vec<_> = staging_sql::load_customer_changes_all(pool)
        .await?
        .into_iter()
        .filter(|r| r.lsn <= cutoff)
        .collect();
    let payments: Vec<_> = staging_sql::load_payment_changes_window(pool, window_start)
        .await?
        .into_iter()
        .filter(|r| r.lsn <= cutoff)
        .collect();

    let host = Host::open()?;
    host.load_orders(&orders)?;
    host.load_customers(&customers)?;
    host.load_payments(&payments)?;

    let rows = host.compute_kpi(window_start)?;

    let mut tx = pool.begin().await?;

    sqlx::query("delete from proj_orders_kpi where bucket >= $1")
        .bind(window_start)
        .execute(&mut *tx)
        .await?;

    for row in &rows {
        sqlx::query(
            r#"
            insert into proj_orders_kpi
                (bucket, segment, order_count, order_sum, payment_count, paid_sum)
            values ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(row.bucket)
        .bind(&row.segment)
        .bind(row.order_count)
        .bind(row.order_sum)
        .bind(row.payment_count)
        .bind(row.paid_sum)
        .execute(&mut *tx)
        .await?;
    }

    for capture in bound.iter().copied() {
        metadata_sql::update_projection_checkpoint_tx(&mut tx, projection, capture, cutoff).await?;
    }
    metadata_sql::upsert_projection_metadata_tx(&mut tx, projection, cutoff, Status::Ok, None)
        .await?;

    tx.commit().await?;

    Ok(CycleOutcome::Built { rows: rows.len(), as_of_lsn: cutoff })
}

/// Truncates to the start of the minute, matching the bucket grain
/// `compute_kpi` groups by.
fn floor_to_minute(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt - Duration::seconds(dt.second() as i64) - Duration::nanoseconds(dt.nanosecond() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn floor_to_minute_drops_seconds_and_subseconds() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 1, 12, 34, 56).unwrap() + Duration::milliseconds(250);
        let floored = floor_to_minute(dt);
        assert_eq!(floored.second(), 0);
        assert_eq!(floored.minute(), 34);
        assert_eq!(floored.nanosecond(), 0);
    }
}
