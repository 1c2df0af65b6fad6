use vmsync_cloud::CloudError;
use vmsync_storage::error::StorageError;

/// Errors returned by the sync services and the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The request itself is malformed (e.g. no account ids).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The account belongs to another user.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Fetch(#[from] CloudError),

    #[error(transparent)]
    Persistence(#[from] StorageError),
}

impl SyncError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        SyncError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
