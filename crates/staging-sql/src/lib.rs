//! Append-only staging tables for each capture instance, plus the delta
//! existence check and bulk loads projection workers use (SPEC_FULL.md
//! §4.3).

mod customers;
mod error;
mod orders;
mod payments;

pub use customers::{insert_customer_changes_tx, load_customer_changes_all};
pub use error::Error;
pub use orders::{insert_order_changes_tx, load_order_changes_all, load_order_changes_window};
pub use payments::{insert_payment_changes_tx, load_payment_changes_window};

use lsn::Lsn;
use model::Capture;

/// True iff `table` holds any row with `from_lsn < lsn <= to_lsn`. The
/// half-open lower bound matches the ingestor's `increment`-based window
/// (SPEC_FULL.md §4.5 step 3), so a checkpoint exactly at `from_lsn` is
/// correctly treated as already consumed.
pub async fn has_deltas(
    pool: &sqlx::PgPool,
    capture: Capture,
    from_lsn: Lsn,
    to_lsn: Lsn,
) -> Result<bool, Error> {
    let table = capture.staging_table();
    let sql = format!(
        "select exists(select 1 from {table} where lsn > $1 and lsn <= $2)",
        table = table
    );
    let exists: bool = sqlx::query_scalar(&sql)
        .bind(from_lsn.as_bytes().as_slice())
        .bind(to_lsn.as_bytes().as_slice())
        .fetch_one(pool)
        .await?;
    Ok(exists)
}
