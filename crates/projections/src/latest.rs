use crate::{common, CycleOutcome, Error};
use metadata_sql::Status;
use model::Projection;
use projection_host::Host;

/// One full-rebuild cycle of the latest-state projection (SPEC_FULL.md
/// §4.8).
pub async fn run_cycle(pool: &sqlx::PgPool, source_name: &str) -> Result<CycleOutcome, Error> {
    let projection = Projection::OrdersLatest;
    let bound = projection.bound_captures();

    let Some(cutoff) = common::compute_cutoff(pool, source_name, projection).await? else {
        return Ok(CycleOutcome::NothingToDo);
    };

    let checkpoints = metadata_sql::get_projection_checkpoints(pool, projection, bound).await?;
    if !common::has_any_deltas(pool, &checkpoints, cutoff).await? {
        return Ok(CycleOutcome::NothingToDo);
    }

    // Bound the replay to `cutoff`, same rationale as the KPI worker
    // (SPEC_FULL.md §8 "Cutoff safety").
    let orders: Vec<_> = staging_sql::load_order_changes_all(pool)
        .await?
        .into_iter()
        .filter(|r| r.lsn <= cutoff)
        .collect();
    let customers: Vec<_> = staging_sql::load_customer_changes_all(pool)
        .await?
        .into_iter()
        .filter(|r| r.lsn <= cutoff)
        .collect();

    let host = Host::open()?;
    host.load_orders(&orders)?;
    host.load_customers(&customers)?;

    let rows = host.compute_latest_state()?;

    let mut tx = pool.begin().await?;

    sqlx::query("delete from proj_orders_latest").execute(&mut *tx).await?;

    for row in &rows {
        sqlx::query(
            r#"
            insert into proj_orders_latest
                (order_id, customer_id, segment, amount, status, created_at, source_lsn)
            values ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(row.order_id)
        .bind(row.customer_id)
        .bind(&row.segment)
        .bind(row.amount)
        .bind(&row.status)
        .bind(row.created_at)
        .bind(row.source_lsn.as_bytes().as_slice())
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
