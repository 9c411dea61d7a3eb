//! Scenarios 1 and 5 from SPEC_FULL.md §8, run against a real Postgres
//! instance via `sqlx::test`'s per-test database.

use lsn::Lsn;
use model::{Capture, CustomerChange, Nullable, Op};
use source::fake::FakeSourceStore;

fn customer(lsn: &str, seqval: &str, customer_id: i64) -> CustomerChange {
    CustomerChange {
        lsn: Lsn::from_hex(lsn).unwrap(),
        seqval: Lsn::from_hex(seqval).unwrap(),
        op: Op::Insert,
        customer_id,
        segment: Nullable::null(),
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn bootstrap_from_empty_ingests_in_lsn_seqval_order(pool: sqlx::PgPool) -> sqlx::Result<()> {
    metadata_sql::ensure_bootstrap(&pool, "source1", &Capture::ALL, &[])
        .await
        .unwrap();

    let source = FakeSourceStore::new();
    source.push_customer(customer("0x01", "0x01", 1));
    source.push_customer(customer("0x01", "0x02", 2));
    source.push_customer(customer("0x02", "0x01", 3));

    let outcome = ingestor::run_cycle(&pool, &source, "source1", Capture::Customers, 100)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        ingestor::CycleOutcome::Ingested { rows: 3, .. }
    ));

    let rows = staging_sql::load_customer_changes_all(&pool).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows.iter().map(|r| r.customer_id).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let watermark = metadata_sql::get_ingestion_watermark(&pool, "source1", Capture::Customers)
        .await
        .unwrap();
    assert_eq!(watermark, Lsn::from_hex("0x02").unwrap());

    // Running again with no new source rows is a no-op: watermark and
    // staging contents are unchanged.
    let outcome = ingestor::run_cycle(&pool, &source, "source1", Capture::Customers, 100)
        .await
        .unwrap();
    assert!(matches!(outcome, ingestor::CycleOutcome::NothingToDo));
    assert_eq!(
        staging_sql::load_customer_changes_all(&pool).await.unwrap().len(),
        3
    );

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn retrying_the_same_batch_is_deduplicated_by_the_staging_constraint(
    pool: sqlx::PgPool,
) -> sqlx::Result<()> {
    metadata_sql::ensure_bootstrap(&pool, "source1", &Capture::ALL, &[])
        .await
        .unwrap();

    let rows: Vec<CustomerChange> = (1..=100)
        .map(|id| customer(&format!("0x{:02x}", id), "0x01", id))
        .collect();

    for _ in 0..3 {
        let mut tx = pool.begin().await?;
        staging_sql::insert_customer_changes_tx(&mut tx, &rows)
            .await
            .unwrap();
        tx.commit().await?;
    }

    let staged = staging_sql::load_customer_changes_all(&pool).await.unwrap();
    assert_eq!(staged.len(), 100);

    Ok(())
}
