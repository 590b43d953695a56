//! Error types for CaseDesk services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured `{ success: false, message }` error envelopes
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidTransition,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidCredentials,
    ExpiredToken,

    // Authorization errors (3xxx)
    Forbidden,
    AccountInactive,

    // Resource errors (4xxx)
    NotFound,
    RecordNotFound,
    VendorNotFound,
    FieldOfficerNotFound,
    VerificationNotFound,
    Gone,

    // Conflict errors (5xxx)
    Duplicate,

    // Rate limiting (6xxx)
    RateLimited,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    UpstreamError,
    NotificationError,

    // Internal errors (9xxx)
    InternalError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidTransition => 1004,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidCredentials => 2002,
            ErrorCode::ExpiredToken => 2003,

            ErrorCode::Forbidden => 3001,
            ErrorCode::AccountInactive => 3002,

            ErrorCode::NotFound => 4001,
            ErrorCode::RecordNotFound => 4002,
            ErrorCode::VendorNotFound => 4003,
            ErrorCode::FieldOfficerNotFound => 4004,
            ErrorCode::VerificationNotFound => 4005,
            ErrorCode::Gone => 4010,

            ErrorCode::Duplicate => 5001,

            ErrorCode::RateLimited => 6001,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::NotificationError => 8002,

            ErrorCode::InternalError => 9001,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<String>,
    },

    #[error("{message}")]
    InvalidTransition { message: String },

    // Authentication errors
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("{message}")]
    Forbidden { message: String },

    #[error("Account is deactivated")]
    AccountInactive,

    // Resource errors
    #[error("{message}")]
    NotFound { message: String },

    #[error("Record not found")]
    RecordNotFound { id: String },

    #[error("Vendor not found")]
    VendorNotFound { id: String },

    #[error("Field officer not found")]
    FieldOfficerNotFound { id: String },

    #[error("Verification not found")]
    VerificationNotFound { record_id: String },

    #[error("{message}")]
    Gone { message: String },

    // Conflict errors
    #[error("{message}")]
    Duplicate { message: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Notification error: {message}")]
    Notification { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Build a validation error from a list of messages
    pub fn validation(errors: Vec<String>) -> Self {
        AppError::Validation {
            message: errors.join(", "),
            errors,
        }
    }

    /// Build a single-message validation error
    pub fn invalid(message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            errors: vec![message.clone()],
            message,
        }
    }

    /// Build a 404 with a caller-facing message
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound {
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::AccountInactive => ErrorCode::AccountInactive,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            AppError::VendorNotFound { .. } => ErrorCode::VendorNotFound,
            AppError::FieldOfficerNotFound { .. } => ErrorCode::FieldOfficerNotFound,
            AppError::VerificationNotFound { .. } => ErrorCode::VerificationNotFound,
            AppError::Gone { .. } => ErrorCode::Gone,
            AppError::Duplicate { .. } => ErrorCode::Duplicate,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Notification { .. } => ErrorCode::NotificationError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::InvalidTransition { .. }
            | AppError::Duplicate { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. }
            | AppError::InvalidCredentials
            | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden { .. } | AppError::AccountInactive => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::RecordNotFound { .. }
            | AppError::VendorNotFound { .. }
            | AppError::FieldOfficerNotFound { .. }
            | AppError::VerificationNotFound { .. } => StatusCode::NOT_FOUND,

            // 410 Gone
            AppError::Gone { .. } => StatusCode::GONE,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::HttpClient(_) | AppError::Notification { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Error envelope returned to API clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Internal details stay in the logs
        let message = if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
            "Internal server error".to_string()
        } else {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
            self.to_string()
        };

        let errors = match self {
            AppError::Validation { errors, .. } => errors,
            _ => Vec::new(),
        };

        let body = ErrorResponse {
            success: false,
            message,
            code,
            errors,
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Internal {
            message: format!("Failed to write report: {}", err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        AppError::validation(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::RecordNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::RecordNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Record not found");
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::validation(vec![
            "First Name is required".into(),
            "Pincode is required".into(),
        ]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "First Name is required, Pincode is required");
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_duplicate_is_bad_request() {
        let err = AppError::Duplicate {
            message: "Case Number already exists".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code().as_code(), 5001);
    }

    #[test]
    fn test_transition_and_auth_errors() {
        let err = AppError::InvalidTransition {
            message: "Only submitted cases can be approved".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::AccountInactive.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Gone { message: "expired".into() }.status_code(),
            StatusCode::GONE
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = AppError::not_found("Case not found or not assigned to you");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Case not found or not assigned to you");
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "Something went wrong".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
