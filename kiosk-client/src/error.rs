//! Client error types

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connect, timeout, broken body)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected as invalid
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request conflicts with the current order state (e.g. already fulfilled)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict(_))
    }
}

impl From<AppError> for ClientError {
    fn from(err: AppError) -> Self {
        match err.code {
            ErrorCode::NotFound | ErrorCode::OrderNotFound => ClientError::NotFound(err.message),
            ErrorCode::AlreadyExists
            | ErrorCode::OrderAlreadyFulfilled
            | ErrorCode::DailySequenceExhausted => ClientError::Conflict(err.message),
            _ if err.is_client_error() => ClientError::Validation(err.message),
            _ => ClientError::Internal(err.message),
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
