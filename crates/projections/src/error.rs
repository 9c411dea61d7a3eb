#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Metadata(#[from] metadata_sql::Error),

    #[error(transparent)]
    Staging(#[from] staging_sql::Error),

    #[error(transparent)]
    Host(#[from] projection_host::Error),

    #[error(transparent)]
    Pool(#[from] sqlx::Error),
}
