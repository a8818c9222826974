use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate document id: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),

    #[error("store has been destroyed")]
    Destroyed,
}
