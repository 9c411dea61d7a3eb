use exponential_backoff::Backoff;
use std::time::Duration;

/// Connects a Postgres pool with bounded exponential backoff, the same
/// retry shape `journal-client`'s reader uses for its own reconnects.
pub async fn connect_with_backoff(dsn: &str) -> Result<sqlx::PgPool, sqlx::Error> {
    let backoff = Backoff::new(8, Duration::from_millis(200), Some(Duration::from_secs(10)));
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(5))
            .connect(dsn)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(err) => match backoff.next(attempt) {
                Some(delay) => {
                    tracing::warn!(attempt, error = ?err, delay = ?delay, "failed to connect, retrying");
                    tokio::time::sleep(delay).await;
                }
                None => return Err(err),
            },
        }
    }
}
