//! Projection workers: cross-stream cutoff computation, delta detection,
//! the embedded-SQL transform, and atomic commit of projection rows +
//! checkpoints + metadata (SPEC_FULL.md §4.7, §4.8).

mod common;
mod error;
mod kpi;
mod latest;

pub use error::Error;
pub use kpi::run_cycle as run_kpi_cycle;
pub use latest::run_cycle as run_latest_cycle;

use lsn::Lsn;
use model::Projection;
use std::future::Future;
use std::time::Duration as StdDuration;

#[derive(Debug)]
pub enum CycleOutcome {
    NothingToDo,
    Built { rows: usize, as_of_lsn: Lsn },
}

#[derive(Debug, Clone, Copy)]
pub struct KpiWorkerConfig {
    pub poll_interval: StdDuration,
    pub recompute_window: chrono::Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct LatestWorkerConfig {
    pub poll_interval: StdDuration,
}

/// Runs the KPI worker's loop until `shutdown` resolves. Mirrors the
/// ingestor's loop shape: sleep-or-shutdown, then one cycle, logged and
/// never propagated (SPEC_FULL.md §4.9's "one worker's failure does not
/// affect others").
pub async fn run_kpi_worker<F>(
    pool: sqlx::PgPool,
    source_name: String,
    config: KpiWorkerConfig,
    mut shutdown: F,
) where
    F: Future<Output = ()> + Clone + Unpin,
{
    loop {
        tokio::select! {
            _ = shutdown.clone() => {
                tracing::info!(projection = %Projection::OrdersKpi, "projection worker shutting down");
                return;
            }
            _ = tokio::time::sleep(config.poll_interval) => {}
        }

        match kpi::run_cycle(&pool, &source_name, config.recompute_window).await {
            Ok(CycleOutcome::NothingToDo) => {
                tracing::debug!(projection = %Projection::OrdersKpi, "no deltas since last build");
            }
            Ok(CycleOutcome::Built { rows, as_of_lsn }) => {
                tracing::info!(
                    projection = %Projection::OrdersKpi,
                    rows_built = rows,
                    as_of_lsn = %as_of_lsn,
                    "rebuilt projection"
                );
            }
            Err(err) => {
                tracing::warn!(projection = %Projection::OrdersKpi, error = ?err, "projection cycle failed");
                metadata_sql::mark_projection_error(&pool, Projection::OrdersKpi, &err.to_string())
                    .await;
            }
        }
    }
}

/// Runs the latest-state worker's loop until `shutdown` resolves.
pub async fn run_latest_worker<F>(
    pool: sqlx::PgPool,
    source_name: String,
    config: LatestWorkerConfig,
    mut shutdown: F,
) where
    F: Future<Output = ()> + Clone + Unpin,
{
    loop {
        tokio::select! {
            _ = shutdown.clone() => {
                tracing::info!(projection = %Projection::OrdersLatest, "projection worker shutting down");
                return;
            }
            _ = tokio::time::sleep(config.poll_interval) => {}
        }

        match latest::run_cycle(&pool, &source_name).await {
            Ok(CycleOutcome::NothingToDo) => {
                tracing::debug!(projection = %Projection::OrdersLatest, "no deltas since last build");
            }
            Ok(CycleOutcome::Built { rows, as_of_lsn }) => {
                tracing::info!(
                    projection = %Projection::OrdersLatest,
                    rows_built = rows,
                    as_of_lsn = %as_of_lsn,
                    "rebuilt projection"
                );
            }
            Err(err) => {
                tracing::warn!(projection = %Projection::OrdersLatest, error = ?err, "projection cycle failed");
                metadata_sql::mark_projection_error(&pool, Projection::OrdersLatest, &err.to_string())
                    .await;
            }
        }
    }
}
