use thiserror::Error;

/// Failures at the storage boundary, for either the evaluation fetch or the message lookup.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Pg error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Client timeout error")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors that abort a whole enrichment run.
///
/// A message lookup failure only surfaces here when the pipeline runs in strict mode.
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("failed to fetch evaluations: {0}")]
    PrimaryFetch(#[source] StorageError),

    #[error("failed to look up customer messages: {0}")]
    SecondaryLookup(#[source] StorageError),
}
