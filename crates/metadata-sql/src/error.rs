#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error(transparent)]
    Lsn(#[from] lsn::Error),

    #[error(transparent)]
    Query(#[from] sqlx::Error),
}
