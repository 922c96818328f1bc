/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store returned data that contradicts its own constraints.
    #[error("inconsistent store state: {0}")]
    Inconsistent(String),
}
