use crate::store::errors::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed or out-of-bounds request data
    #[error("{message}")]
    Validation { message: String },

    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Client exceeded its request budget for the current window
    #[error("Too many requests")]
    RateLimited { message: String },

    /// The outbound call did not complete within its deadline
    #[error("Upstream request timed out")]
    Timeout,

    /// The upstream service answered with a non-success status
    #[error("Upstream service returned {status}")]
    Upstream { status: StatusCode },

    /// The upstream answered 2xx but the body did not carry the expected reply
    #[error("Upstream service returned an unusable response")]
    InvalidUpstreamResponse,

    /// A required external dependency is not configured
    #[error("{service} is not available")]
    ServiceUnavailable { service: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Credential store operation error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Timeout => StatusCode::REQUEST_TIMEOUT,
            Error::Upstream { status } => *status,
            Error::InvalidUpstreamResponse => StatusCode::INTERNAL_SERVER_ERROR,
            Error::ServiceUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Store(store_err) => match store_err {
                StoreError::NotFound => StatusCode::NOT_FOUND,
                StoreError::DuplicateUsername { .. } => StatusCode::CONFLICT,
                StoreError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message } => message.clone(),
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::RateLimited { message } => message.clone(),
            Error::Timeout => "Request timeout".to_string(),
            Error::Upstream { .. } => "AI service temporarily unavailable".to_string(),
            Error::InvalidUpstreamResponse => "Invalid response from AI service".to_string(),
            Error::ServiceUnavailable { service } => format!("{service} not available"),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Store(store_err) => match store_err {
                StoreError::NotFound => "Resource not found".to_string(),
                StoreError::DuplicateUsername { .. } => "Username already exists".to_string(),
                StoreError::Other(_) => "Internal server error".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Store(StoreError::Other(_)) | Error::Internal { .. } | Error::Other(_) | Error::InvalidUpstreamResponse => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::ServiceUnavailable { .. } => {
                tracing::error!("Dependency unavailable: {}", self);
            }
            Error::Upstream { status } => {
                tracing::warn!("Upstream error (status {}): {}", status, self);
            }
            Error::Timeout => {
                tracing::warn!("Upstream timeout: {}", self);
            }
            Error::Store(_) => {
                tracing::warn!("Store constraint error: {}", self);
            }
            Error::Unauthenticated { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Validation { .. } | Error::RateLimited { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = json!({ "error": self.user_message() });

        (status, axum::response::Json(body)).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
