//! Error types for the Azure Blob provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Azure Blob provider errors
#[derive(Error, Debug)]
pub enum AzureBlobError {
    /// The SAS token was rejected or has expired
    #[error("Authentication failed (status {status_code}): {message}")]
    AuthenticationFailed { status_code: u16, message: String },

    /// API request returned an error
    #[error("Azure Blob API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Container URL is malformed or lacks a container segment
    #[error("Invalid container URL: {0}")]
    InvalidContainerUrl(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Azure Blob operations
pub type Result<T> = std::result::Result<T, AzureBlobError>;

impl From<AzureBlobError> for BridgeError {
    fn from(error: AzureBlobError) -> Self {
        match error {
            AzureBlobError::BridgeError(e) => e,
            AzureBlobError::InvalidContainerUrl(url) => {
                BridgeError::NotAvailable(format!("Invalid container URL: {}", url))
            }
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
