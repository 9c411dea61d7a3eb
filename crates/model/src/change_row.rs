use crate::{Lsn, Nullable, Op};
use chrono::{DateTime, Utc};

/// Common shape shared by every change-row variant: the fields the
/// ingestor, staging repository, and delta checks all key off of,
/// independent of which capture produced the row.
pub trait ChangeRow {
    fn lsn(&self) -> Lsn;
    fn seqval(&self) -> Lsn;
    fn op(&self) -> Op;
}

/// A change to the `orders` capture instance.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderChange {
    pub lsn: Lsn,
    pub seqval: Lsn,
    pub op: Op,
    pub order_id: i64,
    pub customer_id: Nullable<i64>,
    pub amount: Nullable<f64>,
    pub status: Nullable<String>,
    pub created_at: Nullable<DateTime<Utc>>,
}

impl ChangeRow for OrderChange {
    fn lsn(&self) -> Lsn {
        self.lsn
    }
    fn seqval(&self) -> Lsn {
        self.seqval
    }
    fn op(&self) -> Op {
        self.op
    }
}

/// A change to the `customers` capture instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerChange {
    pub lsn: Lsn,
    pub seqval: Lsn,
    pub op: Op,
    pub customer_id: i64,
    pub segment: Nullable<String>,
}

impl ChangeRow for CustomerChange {
    fn lsn(&self) -> Lsn {
        self.lsn
    }
    fn seqval(&self) -> Lsn {
        self.seqval
    }
    fn op(&self) -> Op {
        self.op
    }
}

/// A change to the `payments` capture instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentChange {
    pub lsn: Lsn,
    pub seqval: Lsn,
    pub op: Op,
    pub payment_id: i64,
    pub order_id: Nullable<i64>,
    pub amount: Nullable<f64>,
    pub paid_at: Nullable<DateTime<Utc>>,
}

impl ChangeRow for PaymentChange {
    fn lsn(&self) -> Lsn {
        self.lsn
    }
    fn seqval(&self) -> Lsn {
        self.seqval
    }
    fn op(&self) -> Op {
        self.op
    }
}
