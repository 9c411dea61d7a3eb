/// Schema for the transient, in-memory mirror of the staging tables a
/// projection cycle needs. Dropped with the connection at the end of the
/// cycle (SPEC_FULL.md §4.6).
pub const BOOTSTRAP: &str = r#"
CREATE TABLE stg_orders (
    lsn         BLOB NOT NULL,
    seqval      BLOB NOT NULL,
    op          INTEGER NOT NULL,
    order_id    INTEGER NOT NULL,
    customer_id INTEGER,
    amount      REAL,
    status      TEXT,
    created_at  TEXT
);

CREATE TABLE stg_customers (
    lsn         BLOB NOT NULL,
    seqval      BLOB NOT NULL,
    op          INTEGER NOT NULL,
    customer_id INTEGER NOT NULL,
    segment     TEXT
);

CREATE TABLE stg_payments (
    lsn         BLOB NOT NULL,
    seqval      BLOB NOT NULL,
    op          INTEGER NOT NULL,
    payment_id  INTEGER NOT NULL,
    order_id    INTEGER,
    amount      REAL,
    paid_at     TEXT
);
"#;

pub fn run(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(BOOTSTRAP)
}
