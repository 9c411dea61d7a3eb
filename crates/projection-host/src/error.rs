#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lsn(#[from] lsn::Error),

    #[error(transparent)]
    Op(#[from] model::InvalidOp),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("timestamp {0:?} is not valid RFC 3339")]
    Timestamp(String),
}
