use core_sync::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

impl From<core_runtime::Error> for ServiceError {
    fn from(error: core_runtime::Error) -> Self {
        match error {
            core_runtime::Error::Config(msg) => ServiceError::Config(msg),
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => ServiceError::CapabilityMissing {
                capability,
                message,
            },
            core_runtime::Error::Internal(msg) => ServiceError::InitializationFailed(msg),
        }
    }
}

impl ServiceError {
    /// The underlying sync failure, if this error came from the sync layer.
    pub fn as_sync(&self) -> Option<&SyncError> {
        match self {
            ServiceError::Sync(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
