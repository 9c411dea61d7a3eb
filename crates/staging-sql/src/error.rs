#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lsn(#[from] lsn::Error),

    #[error(transparent)]
    Op(#[from] model::InvalidOp),

    #[error(transparent)]
    Query(#[from] sqlx::Error),
}
