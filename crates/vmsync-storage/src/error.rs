/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use vmsync_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "account",
///     id: "acct-99".to_string(),
/// };
/// assert!(err.to_string().contains("account"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// An underlying database error.
    #[error("Storage: database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// JSON serialization or deserialization failure (JSON text columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key file or secret encryption failure.
    #[error("Storage: crypto error: {0}")]
    Crypto(String),

    /// Local filesystem failure (data directory, key file).
    #[error("Storage: IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A reconciliation chunk failed and was rolled back.
    #[error("Storage: reconciliation of {kind} failed: {message}")]
    Persistence { kind: &'static str, message: String },
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
