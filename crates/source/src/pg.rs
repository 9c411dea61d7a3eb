use crate::{Error, SourceStore};
use chrono::{DateTime, Utc};
use lsn::Lsn;
use model::{Capture, CustomerChange, Nullable, Op, OrderChange, PaymentChange};
use sqlx::FromRow;

/// A [`SourceStore`] backed by the source database's own CDC functions,
/// exposed as plain SQL functions under a `cdc` schema. The source is a
/// black box (SPEC_FULL.md §1); this type only knows the three call
/// shapes the contract promises.
pub struct PgSourceStore {
    pool: sqlx::PgPool,
}

impl PgSourceStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct WindowRow {
    min_lsn: Option<Vec<u8>>,
    max_lsn: Option<Vec<u8>>,
}

#[derive(FromRow)]
struct OrderChangeRow {
    lsn: Vec<u8>,
    seqval: Vec<u8>,
    op: i16,
    order_id: i64,
    customer_id: Option<i64>,
    amount: Option<f64>,
    status: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderChangeRow> for OrderChange {
    type Error = Error;

    fn try_from(row: OrderChangeRow) -> Result<Self, Error> {
        Ok(OrderChange {
            lsn: Lsn::pad(&row.lsn)?,
            seqval: Lsn::pad(&row.seqval)?,
            op: Op::try_from(row.op).map_err(|e| Error::Malformed(e.to_string()))?,
            order_id: row.order_id,
            customer_id: Nullable(row.customer_id),
            amount: Nullable(row.amount),
            status: Nullable(row.status),
            created_at: Nullable(row.created_at),
        })
    }
}

#[derive(FromRow)]
struct CustomerChangeRow {
    lsn: Vec<u8>,
    seqval: Vec<u8>,
    op: i16,
    customer_id: i64,
    segment: Option<String>,
}

impl TryFrom<CustomerChangeRow> for CustomerChange {
    type Error = Error;

    fn try_from(row: CustomerChangeRow) -> Result<Self, Error> {
        Ok(CustomerChange {
            lsn: Lsn::pad(&row.lsn)?,
            seqval: Lsn::pad(&row.seqval)?,
            op: Op::try_from(row.op).map_err(|e| Error::Malformed(e.to_string()))?,
            customer_id: row.customer_id,
            segment: Nullable(row.segment),
        })
    }
}

#[derive(FromRow)]
struct PaymentChangeRow {
    lsn: Vec<u8>,
    seqval: Vec<u8>,
    op: i16,
    payment_id: i64,
    order_id: Option<i64>,
    amount: Option<f64>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentChangeRow> for PaymentChange {
    type Error = Error;

    fn try_from(row: PaymentChangeRow) -> Result<Self, Error> {
        Ok(PaymentChange {
            lsn: Lsn::pad(&row.lsn)?,
            seqval: Lsn::pad(&row.seqval)?,
            op: Op::try_from(row.op).map_err(|e| Error::Malformed(e.to_string()))?,
            payment_id: row.payment_id,
            order_id: Nullable(row.order_id),
            amount: Nullable(row.amount),
            paid_at: Nullable(row.paid_at),
        })
    }
}

impl SourceStore for PgSourceStore {
    async fn capture_window(&self, capture: Capture) -> Result<Option<(Lsn, Lsn)>, Error> {
        let row: WindowRow = sqlx::query_as("select min_lsn, max_lsn from cdc.fn_capture_window($1)")
            .bind(capture.as_str())
            .fetch_one(&self.pool)
            .await?;

        match (row.min_lsn, row.max_lsn) {
            (Some(min), Some(max)) => Ok(Some((Lsn::pad(&min)?, Lsn::pad(&max)?))),
            _ => Ok(None),
        }
    }

    async fn next_lsn(&self, lsn: Lsn) -> Result<Option<Lsn>, Error> {
        let next: Option<Vec<u8>> = sqlx::query_scalar("select cdc.fn_next_lsn($1)")
            .bind(lsn.as_bytes().as_slice())
            .fetch_one(&self.pool)
            .await?;

        next.map(|bytes| Lsn::pad(&bytes)).transpose().map_err(Into::into)
    }

    async fn fetch_order_changes(
        &self,
        from: Lsn,
        to: Lsn,
        limit: i64,
    ) -> Result<Vec<OrderChange>, Error> {
        let rows: Vec<OrderChangeRow> = sqlx::query_as(
            r#"
            select lsn, seqval, op, order_id, customer_id, amount, status, created_at
            from cdc.fn_fetch_order_changes($1, $2, $3)
            order by lsn, seqval
            "#,
        )
        .bind(from.as_bytes().as_slice())
        .bind(to.as_bytes().as_slice())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderChange::try_from).collect()
    }

    async fn fetch_customer_changes(
        &self,
        from: Lsn,
        to: Lsn,
        limit: i64,
    ) -> Result<Vec<CustomerChange>, Error> {
        let rows: Vec<CustomerChangeRow> = sqlx::query_as(
            r#"
            select lsn, seqval, op, customer_id, segment
            from cdc.fn_fetch_customer_changes($1, $2, $3)
            order by lsn, seqval
            "#,
        )
        .bind(from.as_bytes().as_slice())
        .bind(to.as_bytes().as_slice())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CustomerChange::try_from).collect()
    }

    async fn fetch_payment_changes(
        &self,
        from: Lsn,
        to: Lsn,
        limit: i64,
    ) -> Result<Vec<PaymentChange>, Error> {
        let rows: Vec<PaymentChangeRow> = sqlx::query_as(
            r#"
            select lsn, seqval, op, payment_id, order_id, amount, paid_at
            from cdc.fn_fetch_payment_changes($1, $2, $3)
            order by lsn, seqval
            "#,
        )
        .bind(from.as_bytes().as_slice())
        .bind(to.as_bytes().as_slice())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PaymentChange::try_from).collect()
    }
}
