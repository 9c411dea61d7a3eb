use crate::Error;
use lsn::Lsn;
use model::{Capture, Projection};
use std::collections::BTreeMap;

/// The cross-stream cutoff for `projection`'s bound captures, or `None`
/// if any bound capture has never ingested anything (SPEC_FULL.md §4.7
/// step 1 / §4.8 step 1).
pub async fn compute_cutoff(
    pool: &sqlx::PgPool,
    source_name: &str,
    projection: Projection,
) -> Result<Option<Lsn>, Error> {
    let cutoff =
        metadata_sql::get_min_ingestion_watermark(pool, source_name, projection.bound_captures())
            .await?;
    if cutoff.is_zero() {
        Ok(None)
    } else {
        Ok(Some(cutoff))
    }
}

/// True iff any bound capture has staged rows between its checkpoint and
/// `cutoff` — the "nothing new since the last successful build" guard
/// shared by both projection workers.
pub async fn has_any_deltas(
    pool: &sqlx::PgPool,
    checkpoints: &BTreeMap<Capture, Lsn>,
    cutoff: Lsn,
) -> Result<bool, Error> {
    for (capture, checkpoint) in checkpoints {
        if staging_sql::has_deltas(pool, *capture, *checkpoint, cutoff).await? {
            return Ok(true);
        }
    }
    Ok(false)
}
