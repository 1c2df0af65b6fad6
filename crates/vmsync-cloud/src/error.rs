/// Errors that can occur while fetching from the remote management API.
///
/// # Examples
///
/// ```rust
/// use vmsync_cloud::error::CloudError;
///
/// let err = CloudError::Credential("tenant id is empty".to_string());
/// assert!(err.to_string().contains("tenant id"));
/// assert!(!err.is_transient());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    /// The credential set is incomplete or could not be exchanged for an access token.
    #[error("credential error: {0}")]
    Credential(String),

    /// Non-2xx response from the management API.
    #[error("remote API error: status={status}, code={code}, message={message}")]
    RemoteApi {
        status: u16,
        code: String,
        message: String,
    },

    /// Request was throttled (HTTP 429 or a throttling error code).
    #[error("remote API rate limited: {0}")]
    RateLimited(String),

    /// The operation deadline elapsed before the call completed.
    #[error("operation timed out")]
    Timeout,

    /// The surrounding fetch was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The fetch completed but produced nothing usable.
    #[error("{0}")]
    NoRecords(String),

    /// An underlying HTTP transport error from `reqwest`.
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Caller-supplied value rejected before any remote call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Client configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CloudError {
    /// Rate limits, 5xx responses and transport failures.
    pub fn is_transient(&self) -> bool {
        match self {
            CloudError::RateLimited(_) => true,
            CloudError::RemoteApi { status, .. } => *status >= 500,
            CloudError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CloudError::Timeout)
    }
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, CloudError>;
