//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Paws POS                               │
//! │                                                                         │
//! │  Handler → Result<T, ApiError>                                          │
//! │                                                                         │
//! │  SettlementError::Validation ──────┐                                    │
//! │  CoreError::Validation ────────────┼──► 400 VALIDATION_ERROR            │
//! │  SettlementError::AlreadyCancelled ┼──► 400 ALREADY_CANCELLED           │
//! │  SettlementError::NotFound ────────┼──► 404 NOT_FOUND                   │
//! │  DbError::NotFound ────────────────┘                                    │
//! │  everything else ──────────────────────► 500 DATABASE_ERROR / INTERNAL  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Body: `{ "code": "NOT_FOUND", "message": "Sale not found: 42" }`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use paws_core::{CoreError, ValidationError};
use paws_db::{DbError, SettlementError};

/// API error returned from HTTP handlers.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Sale already cancelled (400)
    AlreadyCancelled,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError | ErrorCode::AlreadyCancelled => StatusCode::BAD_REQUEST,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => {
                ApiError::validation(format!("{} '{}' already exists", field, value))
            }
            DbError::ForeignKeyViolation { message } => {
                error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::PoolExhausted => ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted"),
            other => {
                // Log the actual error but return a generic message
                error!("Database operation failed: {}", other);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::SaleNotFound(id) => ApiError::not_found("Sale", &id),
            CoreError::CustomerNotFound(id) => ApiError::not_found("Customer", &id),
            CoreError::AlreadyCancelled(number) => ApiError::new(
                ErrorCode::AlreadyCancelled,
                format!("Sale {} is already cancelled", number),
            ),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::Validation(e) => e.into(),
            SettlementError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            SettlementError::AlreadyCancelled(number) => ApiError::new(
                ErrorCode::AlreadyCancelled,
                format!("Sale {} is already cancelled", number),
            ),
            SettlementError::Persistence(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_mapping() {
        let err: ApiError = SettlementError::AlreadyCancelled("7".to_string()).into();
        assert_eq!(err.code, ErrorCode::AlreadyCancelled);
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = SettlementError::NotFound {
            entity: "Sale".to_string(),
            id: "x".to_string(),
        }
        .into();
        assert_eq!(err.code.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Sale not found: x");

        let err: ApiError = SettlementError::Validation(ValidationError::required("items")).into();
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_persistence_is_opaque() {
        let err: ApiError =
            SettlementError::Persistence(DbError::QueryFailed("disk I/O error".to_string())).into();
        assert_eq!(err.code.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("disk"));
    }
}
