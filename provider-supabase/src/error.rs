//! Error types for the Supabase provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Supabase provider errors
#[derive(Error, Debug)]
pub enum SupabaseError {
    /// Project URL, key or table name is missing or malformed
    #[error("Invalid Supabase configuration: {0}")]
    InvalidConfig(String),

    /// PostgREST answered with a non-success status
    #[error("Supabase API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Response body or headers could not be interpreted
    #[error("Failed to parse Supabase response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Supabase operations
pub type Result<T> = std::result::Result<T, SupabaseError>;

impl From<SupabaseError> for BridgeError {
    fn from(error: SupabaseError) -> Self {
        match error {
            SupabaseError::InvalidConfig(msg) => BridgeError::NotAvailable(format!("Supabase: {}", msg)),
            SupabaseError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!("API error (status {}): {}", status_code, message)),
            SupabaseError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            SupabaseError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SupabaseError::ApiError {
            status_code: 401,
            message: "Invalid API key".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Supabase API error (status 401): Invalid API key"
        );
    }

    #[test]
    fn test_error_conversion() {
        let bridge_error: BridgeError = SupabaseError::ParseError("bad row".to_string()).into();
        assert!(matches!(bridge_error, BridgeError::OperationFailed(_)));

        let bridge_error: BridgeError = SupabaseError::InvalidConfig("no key".to_string()).into();
        assert!(matches!(bridge_error, BridgeError::NotAvailable(_)));
    }
}
