/// Error Handling Module
///
/// One error type per concern, all funnelled into `AppError`:
/// 1. Domain-specific errors (validation, storage, configuration, authentication)
/// 2. Unified application error used for control flow
/// 3. HTTP response mapping with a structured body
/// 4. Error context for request-scoped logging

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(String),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(String, usize),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(String, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(String),
}

/// Storage errors raised by the user and refresh-token repositories
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Duplicate entry: {0}")]
    UniqueConstraintViolation(String),
    #[error("Database connection error: {0}")]
    ConnectionPool(String),
    #[error("Corrupted record: {0}")]
    CorruptedRecord(String),
    #[error("Database error: {0}")]
    UnexpectedError(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required config: {0}")]
    MissingRequired(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

/// Authentication and authorization errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("A user with this username or email already exists")]
    AlreadyExists,
    #[error("Invalid credentials")]
    AuthFailed,
    #[error("Refresh token is invalid")]
    RefreshTokenInvalid,
    #[error("Refresh token has expired")]
    RefreshTokenExpired,
    #[error("Token is malformed")]
    TokenMalformed,
    #[error("Token signature is invalid")]
    BadSignature,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Missing authentication token")]
    Unauthenticated,
    #[error("Permission denied")]
    PermissionDenied,
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                DatabaseError::UniqueConstraintViolation(
                    db_err.constraint().unwrap_or("unique constraint").to_string(),
                )
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionPool(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::CorruptedRecord(err.to_string())
            }
            _ => DatabaseError::UnexpectedError(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.into())
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AuthError {
    /// Status code and machine-readable code for each authentication failure
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::AlreadyExists => (StatusCode::BAD_REQUEST, "ALREADY_EXISTS"),
            AuthError::AuthFailed => (StatusCode::UNAUTHORIZED, "AUTH_FAILED"),
            AuthError::RefreshTokenInvalid => (StatusCode::UNAUTHORIZED, "REFRESH_TOKEN_INVALID"),
            AuthError::RefreshTokenExpired => (StatusCode::UNAUTHORIZED, "REFRESH_TOKEN_EXPIRED"),
            AuthError::TokenMalformed | AuthError::BadSignature => {
                (StatusCode::UNAUTHORIZED, "TOKEN_INVALID")
            }
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "MISSING_TOKEN"),
            AuthError::PermissionDenied => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR".to_string(),
                e.to_string(),
            ),

            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => (
                    StatusCode::CONFLICT,
                    "DUPLICATE_ENTRY".to_string(),
                    "Duplicate entry".to_string(),
                ),
                DatabaseError::ConnectionPool(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE".to_string(),
                    "Database service temporarily unavailable".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR".to_string(),
                    "Database error occurred".to_string(),
                ),
            },

            AppError::Auth(e) => {
                let (status, code) = e.status_and_code();
                (status, code.to_string(), e.to_string())
            }

            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR".to_string(),
                "Server configuration error".to_string(),
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                "Internal server error".to_string(),
            ),
        };

        let error_response =
            ErrorResponse::new(request_id.to_string(), message, code, status.as_u16());

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Auth(AuthError::AuthFailed) => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

/// Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
                DatabaseError::ConnectionPool(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Auth(e) => e.status_and_code().0,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Operation context attached to log lines emitted by the auth flows
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<i64>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        match error {
            AppError::Validation(_) | AppError::Auth(_) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    user_id = ?self.user_id,
                    error = %error,
                    "Operation rejected"
                );
            }
            _ => {
                tracing::error!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    user_id = ?self.user_id,
                    error = %error,
                    "Operation failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email".to_string());
        assert_eq!(err.to_string(), "email is empty");
    }

    #[test]
    fn test_auth_error_conversion() {
        let app_err: AppError = AuthError::AuthFailed.into();
        match app_err {
            AppError::Auth(AuthError::AuthFailed) => (),
            _ => panic!("Expected Auth error"),
        }
    }

    #[test]
    fn test_auth_error_status_codes() {
        let cases = [
            (AuthError::AlreadyExists, StatusCode::BAD_REQUEST),
            (AuthError::AuthFailed, StatusCode::UNAUTHORIZED),
            (AuthError::RefreshTokenInvalid, StatusCode::UNAUTHORIZED),
            (AuthError::RefreshTokenExpired, StatusCode::UNAUTHORIZED),
            (AuthError::TokenMalformed, StatusCode::UNAUTHORIZED),
            (AuthError::BadSignature, StatusCode::UNAUTHORIZED),
            (AuthError::PermissionDenied, StatusCode::FORBIDDEN),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::Auth(err).status_code(), expected, "{:?}", err);
        }
    }

    #[test]
    fn test_auth_failed_message_is_generic() {
        let (_, body) = ErrorHandler::error_response(&AppError::Auth(AuthError::AuthFailed), "id");
        assert_eq!(body.message, "Invalid credentials");
        assert_eq!(body.code, "AUTH_FAILED");
    }

    #[test]
    fn test_error_response_creation() {
        let response = ErrorResponse::new(
            "test-123".to_string(),
            "Test error".to_string(),
            "TEST_ERROR".to_string(),
            400,
        );

        assert_eq!(response.error_id, "test-123");
        assert_eq!(response.code, "TEST_ERROR");
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("sign_in");
        assert_eq!(ctx.operation, "sign_in");
        assert!(ctx.user_id.is_none());

        let ctx = ctx.with_user_id(7);
        assert_eq!(ctx.user_id, Some(7));
    }
}
