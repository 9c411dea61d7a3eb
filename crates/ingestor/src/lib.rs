//! Per-capture CDC polling loop: read the watermark, ask the source for
//! its current change window, fetch the next batch, and commit it to
//! staging alongside the advanced watermark (SPEC_FULL.md §4.5).

mod error;

pub use error::Error;

use lsn::Lsn;
use model::Capture;
use source::SourceStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct IngestorConfig {
    pub poll_interval: Duration,
    pub batch_max_rows: i64,
}

/// What a single cycle accomplished, for the caller to log.
#[derive(Debug)]
pub enum CycleOutcome {
    NothingToDo,
    Ingested { rows: usize, as_of_lsn: Lsn },
}

/// Runs `capture`'s polling loop until `shutdown` resolves. Each iteration
/// sleeps for `poll_interval` (racing the shutdown signal), then performs
/// one cycle; a cycle error is logged and the loop continues rather than
/// propagating, per the "one worker's failure does not affect others"
/// invariant (SPEC_FULL.md §4.9).
pub async fn run<S, F>(
    pool: sqlx::PgPool,
    source: Arc<S>,
    source_name: String,
    capture: Capture,
    config: IngestorConfig,
    mut shutdown: F,
) where
    S: SourceStore,
    F: Future<Output = ()> + Clone + Unpin,
{
    loop {
        tokio::select! {
            _ = shutdown.clone() => {
                tracing::info!(%capture, "ingestor shutting down");
                return;
            }
            _ = tokio::time::sleep(config.poll_interval) => {}
        }

        match run_cycle(&pool, source.as_ref(), &source_name, capture, config.batch_max_rows).await {
            Ok(CycleOutcome::NothingToDo) => {
                tracing::debug!(%capture, "nothing to ingest this cycle");
            }
            Ok(CycleOutcome::Ingested { rows, as_of_lsn }) => {
                tracing::info!(%capture, rows_ingested = rows, as_of_lsn = %as_of_lsn, "ingested batch");
            }
            Err(err) => {
                tracing::warn!(%capture, error = ?err, "ingestor cycle failed; will retry next cycle");
            }
        }
    }
}

#[tracing::instrument(skip(pool, source), fields(%capture))]
pub async fn run_cycle<S: SourceStore>(
    pool: &sqlx::PgPool,
    source: &S,
    source_name: &str,
    capture: Capture,
    batch_max_rows: i64,
) -> Result<CycleOutcome, Error> {
    let last_lsn = metadata_sql::get_ingestion_watermark(pool, source_name, capture).await?;

    let Some((min_lsn, max_lsn)) = source.capture_window(capture).await? else {
        return Ok(CycleOutcome::NothingToDo);
    };

    let Some(from_lsn) = resolve_from_lsn(source, last_lsn, min_lsn).await? else {
        return Ok(CycleOutcome::NothingToDo);
    };

    if from_lsn > max_lsn {
        return Ok(CycleOutcome::NothingToDo);
    }

    ingest_window(pool, source, source_name, capture, from_lsn, max_lsn, batch_max_rows).await
}

/// Step 3 of the cycle: bootstrap from `min_lsn` on first run or after
/// retention truncation (logging the truncation as data loss, not masking
/// it), otherwise delegate to the source's own "next LSN" primitive.
async fn resolve_from_lsn<S: SourceStore>(
    source: &S,
    last_lsn: Lsn,
    min_lsn: Lsn,
) -> Result<Option<Lsn>, Error> {
    if last_lsn.is_zero() {
        return Ok(Some(min_lsn));
    }
    if last_lsn < min_lsn {
        tracing::warn!(
            %last_lsn,
            %min_lsn,
            "source retained window starts after the ingestor's watermark; data was lost and this capture is re-bootstrapping"
        );
        return Ok(Some(min_lsn));
    }
    Ok(source.next_lsn(last_lsn).await?)
}

async fn ingest_window<S: SourceStore>(
    pool: &sqlx::PgPool,
    source: &S,
    source_name: &str,
    capture: Capture,
    from_lsn: Lsn,
    max_lsn: Lsn,
    batch_max_rows: i64,
) -> Result<CycleOutcome, Error> {
    match capture {
        Capture::Orders => {
            let rows = match source
                .fetch_order_changes(from_lsn, max_lsn, batch_max_rows)
                .await
            {
                Ok(rows) => rows,
                Err(source::Error::WindowUnavailable(_)) => return Ok(CycleOutcome::NothingToDo),
                Err(err) => return Err(err.into()),
            };
            if rows.is_empty() {
                return Ok(CycleOutcome::NothingToDo);
            }
            let as_of_lsn = rows.last().expect("checked non-empty").lsn;

            let mut tx = pool.begin().await?;
            staging_sql::insert_order_changes_tx(&mut tx, &rows).await?;
            metadata_sql::update_ingestion_watermark_tx(&mut tx, source_name, capture, as_of_lsn)
                .await?;
            tx.commit().await?;

            Ok(CycleOutcome::Ingested { rows: rows.len(), as_of_lsn })
        }
        Capture::Customers => {
            let rows = match source
                .fetch_customer_changes(from_lsn, max_lsn, batch_max_rows)
                .await
            {
                Ok(rows) => rows,
                Err(source::Error::WindowUnavailable(_)) => return Ok(CycleOutcome::NothingToDo),
                Err(err) => return Err(err.into()),
            };
            if rows.is_empty() {
                return Ok(CycleOutcome::NothingToDo);
            }
            let as_of_lsn = rows.last().expect("checked non-empty").lsn;

            let mut tx = pool.begin().await?;
            staging_sql::insert_customer_changes_tx(&mut tx, &rows).await?;
            metadata_sql::update_ingestion_watermark_tx(&mut tx, source_name, capture, as_of_lsn)
                .await?;
            tx.commit().await?;

            Ok(CycleOutcome::Ingested { rows: rows.len(), as_of_lsn })
        }
        Capture::Payments => {
            let rows = match source
                .fetch_payment_changes(from_lsn, max_lsn, batch_max_rows)
                .await
            {
                Ok(rows) => rows,
                Err(source::Error::WindowUnavailable(_)) => return Ok(CycleOutcome::NothingToDo),
                Err(err) => return Err(err.into()),
            };
            if rows.is_empty() {
                return Ok(CycleOutcome::NothingToDo);
            }
            let as_of_lsn = rows.last().expect("checked non-empty").lsn;

            let mut tx = pool.begin().await?;
            staging_sql::insert_payment_changes_tx(&mut tx, &rows).await?;
            metadata_sql::update_ingestion_watermark_tx(&mut tx, source_name, capture, as_of_lsn)
                .await?;
            tx.commit().await?;

            Ok(CycleOutcome::Ingested { rows: rows.len(), as_of_lsn })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use source::fake::FakeSourceStore;

    #[tokio::test]
    async fn resolve_from_lsn_bootstraps_from_zero_watermark() {
        let source = FakeSourceStore::new();
        let min = Lsn::pad(&[5]).unwrap();
        let from = resolve_from_lsn(&source, Lsn::ZERO, min).await.unwrap();
        assert_eq!(from, Some(min));
    }

    #[tokio::test]
    async fn resolve_from_lsn_rebootstraps_after_retention_truncation() {
        let source = FakeSourceStore::new();
        let last = Lsn::pad(&[3]).unwrap();
        let min = Lsn::pad(&[5]).unwrap();
        let from = resolve_from_lsn(&source, last, min).await.unwrap();
        assert_eq!(from, Some(min));
    }

    #[tokio::test]
    async fn resolve_from_lsn_advances_past_watermark_otherwise() {
        let source = FakeSourceStore::new();
        let last = Lsn::pad(&[5]).unwrap();
        let min = Lsn::pad(&[1]).unwrap();
        let from = resolve_from_lsn(&source, last, min).await.unwrap();
        assert_eq!(from, last.increment());
    }

    #[tokio::test]
    async fn resolve_from_lsn_is_none_when_source_cannot_advance() {
        // The source's own next-lsn primitive overflowing past the maximum
        // representable LSN is the only case where this returns `None`.
        let source = FakeSourceStore::new();
        let last = Lsn::pad(&[0xff; lsn::LEN]).unwrap();
        let from = resolve_from_lsn(&source, last, Lsn::ZERO).await.unwrap();
        assert_eq!(from, None);
    }
}
