use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("product with ID \"{id}\" not found")]
    ProductNotFound { id: String },

    #[error("product with ID \"{id}\" already exists")]
    DuplicateProduct { id: String },

    #[error("version {version} of product \"{id}\" not found")]
    VersionNotFound { id: String, version: u32 },

    #[error("storage connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("invalid JSON in storage file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[source] serde_json::Error),

    // Programmer errors, always surfaced.
    #[error("transaction is no longer active")]
    TransactionInactive,

    #[error("transaction has already been committed")]
    TransactionCommitted,
}
