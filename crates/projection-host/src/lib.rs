//! The embedded analytical SQL kernel projection workers use to compute
//! their transforms. One [`Host`] is opened per cycle and dropped at the
//! end of it — no state survives across cycles (SPEC_FULL.md §4.6).

mod error;
mod kpi;
mod latest;
mod load;
mod schema;

pub use error::Error;
pub use kpi::KpiRow;
pub use latest::LatestStateRow;

use chrono::{DateTime, Utc};
use model::{CustomerChange, OrderChange, PaymentChange};
use rusqlite::Connection;

pub struct Host {
    conn: Connection,
}

impl Host {
    /// Opens a fresh in-memory connection and creates the transient
    /// staging mirror. Nothing here is persisted beyond `self`.
    pub fn open() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        schema::run(&conn)?;
        Ok(Self { conn })
    }

    pub fn load_orders(&self, rows: &[OrderChange]) -> Result<(), Error> {
        load::load_orders(&self.conn, rows)
    }

    pub fn load_customers(&self, rows: &[CustomerChange]) -> Result<(), Error> {
        load::load_customers(&self.conn, rows)
    }

    pub fn load_payments(&self, rows: &[PaymentChange]) -> Result<(), Error> {
        load::load_payments(&self.conn, rows)
    }

    /// Runs the collapse-to-latest, enrich, bucket, and full-outer-join
    /// transform behind the KPI projection (SPEC_FULL.md §4.7 step 6).
    pub fn compute_kpi(&self, window_start: DateTime<Utc>) -> Result<Vec<KpiRow>, Error> {
        kpi::compute(&self.conn, window_start)
    }

    /// Runs the collapse-to-latest transform behind the latest-state
    /// projection (SPEC_FULL.md §4.8 step 4).
    pub fn compute_latest_state(&self) -> Result<Vec<LatestStateRow>, Error> {
        latest::compute(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsn::Lsn;
    use model::{Nullable, Op};
    use pretty_assertions::assert_eq;

    fn order(order_id: i64, lsn: u8, op: Op, amount: f64, customer_id: i64) -> OrderChange {
        order_at(order_id, lsn, op, amount, customer_id, Utc::now())
    }

    fn order_at(
        order_id: i64,
        lsn: u8,
        op: Op,
        amount: f64,
        customer_id: i64,
        created_at: DateTime<Utc>,
    ) -> OrderChange {
        OrderChange {
            lsn: Lsn::pad(&[lsn]).unwrap(),
            seqval: Lsn::pad(&[0]).unwrap(),
            op,
            order_id,
            customer_id: Nullable::some(customer_id),
            amount: Nullable::some(amount),
            status: Nullable::some("open".to_string()),
            created_at: Nullable::some(created_at),
        }
    }

    fn customer(customer_id: i64, lsn: u8, op: Op, segment: Option<&str>) -> CustomerChange {
        CustomerChange {
            lsn: Lsn::pad(&[lsn]).unwrap(),
            seqval: Lsn::pad(&[0]).unwrap(),
            op,
            customer_id,
            segment: Nullable(segment.map(str::to_string)),
        }
    }

    #[test]
    fn latest_state_collapses_to_the_highest_lsn_and_drops_deletes() {
        let host = Host::open().unwrap();
        host.load_orders(&[
            order(1, 1, Op::Insert, 10.0, 7),
            order(1, 2, Op::UpdateAfter, 20.0, 7),
            order(2, 1, Op::Insert, 5.0, 7),
            order(2, 2, Op::Delete, 5.0, 7),
        ])
        .unwrap();
        host.load_customers(&[customer(7, 1, Op::Insert, Some("SMB"))])
            .unwrap();

        let rows = host.compute_latest_state().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_id, 1);
        assert_eq!(rows[0].amount, Some(20.0));
        assert_eq!(rows[0].segment.as_deref(), Some("SMB"));
    }

    #[test]
    fn latest_state_retains_null_segment_when_customer_absent() {
        let host = Host::open().unwrap();
        host.load_orders(&[order(1, 1, Op::Insert, 10.0, 99)])
            .unwrap();

        let rows = host.compute_latest_state().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].segment, None);
    }

    #[test]
    fn kpi_substitutes_unknown_for_missing_segment() {
        let host = Host::open().unwrap();
        host.load_orders(&[order(1, 1, Op::Insert, 10.0, 99)])
            .unwrap();

        let window_start = Utc::now() - chrono::Duration::hours(1);
        let rows = host.compute_kpi(window_start).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].segment, "UNKNOWN");
        assert_eq!(rows[0].order_count, 1);
    }

    /// Fixed timestamps (no `Utc::now()`) so the snapshot is deterministic
    /// across runs: two segments, two buckets, one payment-only bucket.
    #[test]
    fn kpi_bucket_and_segment_grain_matches_snapshot() {
        let t0 = "2026-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let t1 = "2026-01-01T00:01:00Z".parse::<DateTime<Utc>>().unwrap();

        let host = Host::open().unwrap();
        host.load_orders(&[
            order_at(1, 1, Op::Insert, 10.0, 7, t0),
            order_at(2, 1, Op::Insert, 20.0, 8, t0),
            order_at(3, 1, Op::Insert, 30.0, 7, t1),
        ])
        .unwrap();
        host.load_customers(&[
            customer(7, 1, Op::Insert, Some("SMB")),
            customer(8, 1, Op::Insert, Some("ENTERPRISE")),
        ])
        .unwrap();

        let window_start = "2025-12-31T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let rows = host.compute_kpi(window_start).unwrap();
        insta::assert_debug_snapshot!(rows);
    }
}
