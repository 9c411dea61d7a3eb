//! A deterministic, in-memory [`SourceStore`] used by integration tests
//! elsewhere in the workspace to exercise the end-to-end scenarios in
//! SPEC_FULL.md §8 without a live source connection.

use crate::{Error, SourceStore};
use lsn::Lsn;
use model::{Capture, CustomerChange, OrderChange, PaymentChange};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeSourceStore {
    orders: Mutex<Vec<OrderChange>>,
    customers: Mutex<Vec<CustomerChange>>,
    payments: Mutex<Vec<PaymentChange>>,
    /// Per-capture retained window floor. Simulates retention truncation
    /// when set above zero.
    retained_from: Mutex<BTreeMap<Capture, Lsn>>,
}

impl FakeSourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_order(&self, row: OrderChange) {
        self.orders.lock().unwrap().push(row);
    }

    pub fn push_customer(&self, row: CustomerChange) {
        self.customers.lock().unwrap().push(row);
    }

    pub fn push_payment(&self, row: PaymentChange) {
        self.payments.lock().unwrap().push(row);
    }

    /// Simulates the source trimming its retained window up to (and
    /// including) `lsn`, as in SPEC_FULL.md §1's best-effort truncation
    /// handling.
    pub fn truncate_retention(&self, capture: Capture, lsn: Lsn) {
        self.retained_from.lock().unwrap().insert(capture, lsn);
    }

    fn window<T>(&self, capture: Capture, rows: &[T], lsn_of: impl Fn(&T) -> Lsn) -> Option<(Lsn, Lsn)> {
        let floor = self
            .retained_from
            .lock()
            .unwrap()
            .get(&capture)
            .copied()
            .unwrap_or(Lsn::ZERO);
        let retained: Vec<Lsn> = rows.iter().map(lsn_of).filter(|lsn| *lsn >= floor).collect();
        let min = retained.iter().min().copied()?;
        let max = retained.iter().max().copied()?;
        Some((min, max))
    }
}

impl SourceStore for FakeSourceStore {
    async fn capture_window(&self, capture: Capture) -> Result<Option<(Lsn, Lsn)>, Error> {
        Ok(match capture {
            Capture::Orders => {
                let rows = self.orders.lock().unwrap();
                self.window(capture, &rows, |r| r.lsn)
            }
            Capture::Customers => {
                let rows = self.customers.lock().unwrap();
                self.window(capture, &rows, |r| r.lsn)
            }
            Capture::Payments => {
                let rows = self.payments.lock().unwrap();
                self.window(capture, &rows, |r| r.lsn)
            }
        })
    }

    async fn next_lsn(&self, lsn: Lsn) -> Result<Option<Lsn>, Error> {
        Ok(lsn.increment())
    }

    async fn fetch_order_changes(
        &self,
        from: Lsn,
        to: Lsn,
        limit: i64,
    ) -> Result<Vec<OrderChange>, Error> {
        let mut rows: Vec<OrderChange> = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.lsn >= from && r.lsn <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.lsn, r.seqval));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn fetch_customer_changes(
        &self,
        from: Lsn,
        to: Lsn,
        limit: i64,
    ) -> Result<Vec<CustomerChange>, Error> {
        let mut rows: Vec<CustomerChange> = self
            .customers
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.lsn >= from && r.lsn <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.lsn, r.seqval));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn fetch_payment_changes(
        &self,
        from: Lsn,
        to: Lsn,
        limit: i64,
    ) -> Result<Vec<PaymentChange>, Error> {
        let mut rows: Vec<PaymentChange> = self
            .payments
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.lsn >= from && r.lsn <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.lsn, r.seqval));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}
