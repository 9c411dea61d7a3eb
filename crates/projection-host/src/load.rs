use crate::Error;
use model::{CustomerChange, OrderChange, PaymentChange};
use rusqlite::{params, Connection};

fn to_iso(dt: Option<chrono::DateTime<chrono::Utc>>) -> Option<String> {
    dt.map(|dt| dt.to_rfc3339())
}

/// Bulk-inserts staged order rows into the transient mirror. `NULL`
/// segment handling happens downstream in the KPI/latest-state queries,
/// not here.
pub fn load_orders(conn: &Connection, rows: &[OrderChange]) -> Result<(), Error> {
    let mut stmt = conn.prepare(
        "insert into stg_orders (lsn, seqval, op, order_id, customer_id, amount, status, created_at)
         values (?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.lsn.as_bytes().as_slice(),
            row.seqval.as_bytes().as_slice(),
            i16::from(row.op),
            row.order_id,
            row.customer_id.into_inner(),
            row.amount.into_inner(),
            row.status.clone().into_inner(),
            to_iso(row.created_at.into_inner()),
        ])?;
    }
    Ok(())
}

pub fn load_customers(conn: &Connection, rows: &[CustomerChange]) -> Result<(), Error> {
    let mut stmt = conn.prepare(
        "insert into stg_customers (lsn, seqval, op, customer_id, segment) values (?, ?, ?, ?, ?)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.lsn.as_bytes().as_slice(),
            row.seqval.as_bytes().as_slice(),
            i16::from(row.op),
            row.customer_id,
            row.segment.clone().into_inner(),
        ])?;
    }
    Ok(())
}

pub fn load_payments(conn: &Connection, rows: &[PaymentChange]) -> Result<(), Error> {
    let mut stmt = conn.prepare(
        "insert into stg_payments (lsn, seqval, op, payment_id, order_id, amount, paid_at)
         values (?, ?, ?, ?, ?, ?, ?)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.lsn.as_bytes().as_slice(),
            row.seqval.as_bytes().as_slice(),
            i16::from(row.op),
            row.payment_id,
            row.order_id.into_inner(),
            row.amount.into_inner(),
            to_iso(row.paid_at.into_inner()),
        ])?;
    }
    Ok(())
}
