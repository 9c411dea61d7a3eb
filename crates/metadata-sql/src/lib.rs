//! The metadata repository: watermarks, projection checkpoints, and
//! projection status/health rows, all stored in the serving database
//! (SPEC_FULL.md §4.2).

mod error;
mod status;

pub use error::Error;
pub use status::Status;

use lsn::Lsn;
use model::{Capture, Projection};
use std::collections::BTreeMap;

/// `last_error` is truncated to this many characters before being written,
/// to fit the fixed-width column contract (SPEC_FULL.md §9).
pub const LAST_ERROR_MAX_LEN: usize = 3_900;

/// Idempotently seeds the control tables for `source`'s captures and every
/// projection's bound captures. Safe to call on every process start.
#[tracing::instrument(skip(pool, projections))]
pub async fn ensure_bootstrap(
    pool: &sqlx::PgPool,
    source: &str,
    captures: &[Capture],
    projections: &[Projection],
) -> Result<(), Error> {
    let mut tx = pool.begin().await?;

    for capture in captures {
        sqlx::query(
            r#"
            insert into ctl_ingestion_watermarks (source_name, capture_instance, last_ingested_lsn, updated_at)
            values ($1, $2, $3, now())
            on conflict (source_name, capture_instance) do nothing
            "#,
        )
        .bind(source)
        .bind(capture.as_str())
        .bind(Lsn::ZERO.as_bytes().as_slice())
        .execute(&mut *tx)
        .await?;
    }

    for projection in projections {
        for capture in projection.bound_captures() {
            sqlx::query(
                r#"
                insert into ctl_projection_checkpoints (projection_name, capture_instance, last_consumed_lsn, updated_at)
                values ($1, $2, $3, now())
                on conflict (projection_name, capture_instance) do nothing
                "#,
            )
            .bind(projection.as_str())
            .bind(capture.as_str())
            .bind(Lsn::ZERO.as_bytes().as_slice())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            insert into ctl_projection_metadata (projection_name, as_of_lsn, as_of_time, built_at, status, last_error)
            values ($1, $2, null, null, $3, null)
            on conflict (projection_name) do nothing
            "#,
        )
        .bind(projection.as_str())
        .bind(Lsn::ZERO.as_bytes().as_slice())
        .bind(Status::Init)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn get_ingestion_watermark(
    pool: &sqlx::PgPool,
    source: &str,
    capture: Capture,
) -> Result<Lsn, Error> {
    let row: Option<Vec<u8>> = sqlx::query_scalar(
        r#"
        select last_ingested_lsn from ctl_ingestion_watermarks
        where source_name = $1 and capture_instance = $2
        "#,
    )
    .bind(source)
    .bind(capture.as_str())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(bytes) => Ok(Lsn::pad(&bytes)?),
        None => Ok(Lsn::ZERO),
    }
}

/// The cross-stream cutoff: `min(last_ingested_lsn)` across `captures`.
/// Fails with [`Error::InvalidArgument`] if `captures` is empty — a
/// projection bound to zero captures has no well-defined cutoff.
pub async fn get_min_ingestion_watermark(
    pool: &sqlx::PgPool,
    source: &str,
    captures: &[Capture],
) -> Result<Lsn, Error> {
    if captures.is_empty() {
        return Err(Error::InvalidArgument("captures must not be empty"));
    }

    let mut cutoff = None;
    for capture in captures {
        let watermark = get_ingestion_watermark(pool, source, *capture).await?;
        cutoff = Some(match cutoff {
            Some(current) => Lsn::min(current, watermark),
            None => watermark,
        });
    }
    Ok(cutoff.expect("captures is non-empty"))
}

pub async fn update_ingestion_watermark_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    source: &str,
    capture: Capture,
    lsn: Lsn,
) -> Result<(), Error> {
    sqlx::query(
        r#"
        update ctl_ingestion_watermarks
        set last_ingested_lsn = $3, updated_at = now()
        where source_name = $1 and capture_instance = $2
        "#,
    )
    .bind(source)
    .bind(capture.as_str())
    .bind(lsn.as_bytes().as_slice())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Returns a checkpoint for every requested capture, defaulting absent
/// entries to zero rather than erroring — a projection that has never run
/// against a capture hasn't consumed anything from it yet.
pub async fn get_projection_checkpoints(
    pool: &sqlx::PgPool,
    projection: Projection,
    captures: &[Capture],
) -> Result<BTreeMap<Capture, Lsn>, Error> {
    let mut checkpoints = BTreeMap::new();
    for capture in captures {
        let row: Option<Vec<u8>> = sqlx::query_scalar(
            r#"
            select last_consumed_lsn from ctl_projection_checkpoints
            where projection_name = $1 and capture_instance = $2
            "#,
        )
        .bind(projection.as_str())
        .bind(capture.as_str())
        .fetch_optional(pool)
        .await?;

        let lsn = match row {
            Some(bytes) => Lsn::pad(&bytes)?,
            None => Lsn::ZERO,
        };
        checkpoints.insert(*capture, lsn);
    }
    Ok(checkpoints)
}

pub async fn update_projection_checkpoint_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    projection: Projection,
    capture: Capture,
    lsn: Lsn,
) -> Result<(), Error> {
    sqlx::query(
        r#"
        update ctl_projection_checkpoints
        set last_consumed_lsn = $3, updated_at = now()
        where projection_name = $1 and capture_instance = $2
        "#,
    )
    .bind(projection.as_str())
    .bind(capture.as_str())
    .bind(lsn.as_bytes().as_slice())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn upsert_projection_metadata_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    projection: Projection,
    as_of_lsn: Lsn,
    status: Status,
    last_error: Option<&str>,
) -> Result<(), Error> {
    let last_error = last_error.map(truncate_last_error);

    sqlx::query(
        r#"
        insert into ctl_projection_metadata (projection_name, as_of_lsn, as_of_time, built_at, status, last_error)
        values ($1, $2, now(), now(), $3, $4)
        on conflict (projection_name) do update set
            as_of_lsn = excluded.as_of_lsn,
            as_of_time = excluded.as_of_time,
            built_at = excluded.built_at,
            status = excluded.status,
            last_error = excluded.last_error
        "#,
    )
    .bind(projection.as_str())
    .bind(as_of_lsn.as_bytes().as_slice())
    .bind(status)
    .bind(last_error)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Best-effort out-of-transaction ERROR flag. Called after a projection
/// cycle's own transaction has already rolled back, so failures here are
/// logged rather than propagated — we don't want a metadata-write failure
/// to mask the original transform error.
#[tracing::instrument(skip(pool, text))]
pub async fn mark_projection_error(pool: &sqlx::PgPool, projection: Projection, text: &str) {
    let truncated = truncate_last_error(text);

    let result = sqlx::query(
        r#"
        update ctl_projection_metadata
        set status = $2, last_error = $3
        where projection_name = $1
        "#,
    )
    .bind(projection.as_str())
    .bind(Status::Error)
    .bind(truncated)
    .execute(pool)
    .await;

    if let Err(err) = result {
        tracing::warn!(?err, %projection, "failed to record projection error status");
    }
}

fn truncate_last_error(text: &str) -> String {
    if text.len() <= LAST_ERROR_MAX_LEN {
        return text.to_string();
    }
    // `String::truncate` panics off a char boundary; sqlx errors can embed
    // non-ASCII server text, so find the largest boundary at or under the
    // limit instead of assuming one byte per char.
    let boundary = text
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= LAST_ERROR_MAX_LEN)
        .last()
        .unwrap_or(0);
    text[..boundary].to_string()
}
