use thiserror::Error;

/// Failures of a sync run or of the local cache.
///
/// `Clone` so every caller joined on one in-flight sync gets the same
/// outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("No internet connection. Please check your network.")]
    Offline,

    #[error("Max sync attempts reached ({attempts}/{max}). Please try again later.")]
    MaxRetriesExceeded { attempts: u32, max: u32 },

    #[error("Remote fetch failed: {0}")]
    RemoteFetchFailed(String),

    #[error("Remote call timed out after {0} ms")]
    Timeout(u64),

    #[error("No data available")]
    NoDataAvailable,

    #[error("Failed to write cache: {0}")]
    CacheWriteFailed(String),

    #[error("Failed to clear cache: {0}")]
    CacheClearFailed(String),

    #[error("Sync run was interrupted: {0}")]
    Interrupted(String),
}

impl SyncError {
    /// Whether the failure came from talking to the remote source.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, SyncError::RemoteFetchFailed(_) | SyncError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
