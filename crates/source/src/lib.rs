//! The client contract for the source store's native change-log
//! mechanism. The source itself — its replication log, its retention
//! policy, the SQL functions it exposes — is an external collaborator;
//! this crate only specifies and implements the contract the ingestor
//! depends on (SPEC_FULL.md §4.4).

mod error;
mod pg;

#[cfg(feature = "test-support")]
pub mod fake;

pub use error::Error;
pub use pg::PgSourceStore;

use lsn::Lsn;
use model::{Capture, CustomerChange, OrderChange, PaymentChange};

/// The three operations the ingestor needs from the source, one fetch
/// routine per capture variant rather than a generic row map (SPEC_FULL.md
/// §9).
pub trait SourceStore: Send + Sync {
    /// Returns the retained change window for `capture`, or `None` if the
    /// source has nothing retained for it yet.
    fn capture_window(
        &self,
        capture: Capture,
    ) -> impl std::future::Future<Output = Result<Option<(Lsn, Lsn)>, Error>> + Send;

    /// The source's own "next LSN" primitive, used to advance past a
    /// watermark with a closed `[from, to]` window. Returns `None` if `lsn`
    /// is already the maximum representable value.
    fn next_lsn(
        &self,
        lsn: Lsn,
    ) -> impl std::future::Future<Output = Result<Option<Lsn>, Error>> + Send;

    fn fetch_order_changes(
        &self,
        from: Lsn,
        to: Lsn,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<OrderChange>, Error>> + Send;

    fn fetch_customer_changes(
        &self,
        from: Lsn,
        to: Lsn,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<CustomerChange>, Error>> + Send;

    fn fetch_payment_changes(
        &self,
        from: Lsn,
        to: Lsn,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<PaymentChange>, Error>> + Send;
}
