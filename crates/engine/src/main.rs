mod config;
mod error;
mod retry;

use anyhow::Context;
use clap::Parser;
use config::Config;
use error::Error;
use futures::FutureExt;
use ingestor::IngestorConfig;
use model::{Capture, Projection};
use projections::{KpiWorkerConfig, LatestWorkerConfig};
use source::PgSourceStore;
use std::sync::Arc;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default failed");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building the tokio runtime")?
        .block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    config.validate().map_err(anyhow::Error::from)?;

    let serving_pool = retry::connect_with_backoff(&config.serving_dsn)
        .await
        .context("connecting to the serving store")?;
    let source_pool = retry::connect_with_backoff(&config.source_dsn)
        .await
        .context("connecting to the source store")?;
    let source_store = Arc::new(PgSourceStore::new(source_pool));

    let mut enabled_projections = Vec::new();
    if config.enable_proj_orders_kpi {
        enabled_projections.push(Projection::OrdersKpi);
    }
    if config.enable_proj_orders_latest {
        enabled_projections.push(Projection::OrdersLatest);
    }

    metadata_sql::ensure_bootstrap(
        &serving_pool,
        &config.source_name,
        &Capture::ALL,
        &enabled_projections,
    )
    .await
    .map_err(Error::from)
    .context("bootstrapping control tables")?;

    let shutdown = register_shutdown_signal()
        .context("installing signal handlers")?
        .shared();

    let mut tasks = Vec::new();

    for capture in Capture::ALL {
        let pool = serving_pool.clone();
        let source_store = source_store.clone();
        let source_name = config.source_name.clone();
        let shutdown = shutdown.clone();
        let ingestor_config = IngestorConfig {
            poll_interval: Duration::from_secs(config.poll_interval_seconds),
            batch_max_rows: config.cdc_batch_max_rows,
        };
        tasks.push(tokio::spawn(async move {
            ingestor::run(pool, source_store, source_name, capture, ingestor_config, shutdown).await;
        }));
    }

    if config.enable_proj_orders_kpi {
        let pool = serving_pool.clone();
        let source_name = config.source_name.clone();
        let shutdown = shutdown.clone();
        let worker_config = KpiWorkerConfig {
            poll_interval: Duration::from_secs(config.projection_interval_seconds),
            recompute_window: chrono::Duration::minutes(config.projection_recompute_window_minutes),
        };
        tasks.push(tokio::spawn(async move {
            projections::run_kpi_worker(pool, source_name, worker_config, shutdown).await;
        }));
    }

    if config.enable_proj_orders_latest {
        let pool = serving_pool.clone();
        let source_name = config.source_name.clone();
        let shutdown = shutdown.clone();
        let worker_config = LatestWorkerConfig {
            poll_interval: Duration::from_secs(config.projection_interval_seconds),
        };
        tasks.push(tokio::spawn(async move {
            projections::run_latest_worker(pool, source_name, worker_config, shutdown).await;
        }));
    }

    for task in tasks {
        task.await.context("worker task panicked")?;
    }

    serving_pool.close().await;

    Ok(())
}

/// Races SIGTERM and SIGINT so the engine exits cleanly under `ctrl-c` at a
/// terminal as well as `docker stop`/`kubectl delete` sending SIGTERM
/// (SPEC_FULL.md §2, §4.9).
fn register_shutdown_signal() -> anyhow::Result<impl std::future::Future<Output = ()>> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    Ok(async move {
        tokio::select!(
            _ = sigterm.recv() => tracing::info!("caught SIGTERM; shutting down"),
            _ = sigint.recv() => tracing::info!("caught SIGINT; shutting down"),
        );
    })
}
