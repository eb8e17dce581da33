/// Unified error handling for the service.
///
/// Every failure maps to a stable error kind plus a human-readable
/// message; internal details are logged but never cross the HTTP
/// boundary.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Validation errors for input data
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    OutOfRange(&'static str),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is required", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::OutOfRange(field) => write!(f, "{} is out of range", field),
            ValidationError::InvalidFormat(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for ValidationError {}

/// Authentication and token-flow errors.
///
/// The token variants mirror the stages of the expired-token verifier:
/// structural parse, algorithm pinning, expiry precondition, then full
/// signature/issuer/audience verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    MissingToken,
    MalformedToken,
    UnsupportedAlgorithm,
    NotYetExpired,
    InvalidToken,
    InvalidSession,
    SessionExpired,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "invalid email or password"),
            AuthError::MissingToken => write!(f, "missing authentication token"),
            AuthError::MalformedToken => write!(f, "token is not a structurally valid JWT"),
            AuthError::UnsupportedAlgorithm => write!(f, "token signing algorithm is not accepted"),
            AuthError::NotYetExpired => write!(f, "access token has not expired yet"),
            AuthError::InvalidToken => write!(f, "invalid token"),
            AuthError::InvalidSession => write!(f, "refresh token does not match the active session"),
            AuthError::SessionExpired => write!(f, "refresh token has expired"),
        }
    }
}

impl StdError for AuthError {}

/// Central error type all handlers return.
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Forbidden,
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Auth(AuthError::InvalidCredentials) => "INVALID_CREDENTIALS",
            AppError::Auth(AuthError::MissingToken) => "MISSING_TOKEN",
            AppError::Auth(AuthError::MalformedToken) => "TOKEN_MALFORMED",
            AppError::Auth(AuthError::UnsupportedAlgorithm) => "TOKEN_ALGORITHM",
            AppError::Auth(AuthError::NotYetExpired) => "TOKEN_NOT_EXPIRED",
            AppError::Auth(AuthError::InvalidToken) => "TOKEN_INVALID",
            AppError::Auth(AuthError::InvalidSession) => "SESSION_INVALID",
            AppError::Auth(AuthError::SessionExpired) => "SESSION_EXPIRED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to return to the caller.
    fn public_message(&self) -> String {
        match self {
            // Internal details stay in the logs.
            AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Forbidden => write!(f, "insufficient permissions"),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::Conflict(msg) => write!(f, "{}", msg),
            AppError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let error_msg = err.to_string();

        if error_msg.contains("duplicate key") || error_msg.contains("unique constraint") {
            AppError::Conflict("record violates a uniqueness constraint".to_string())
        } else if matches!(err, sqlx::Error::RowNotFound) {
            AppError::NotFound("record not found".to_string())
        } else {
            // Transient persistence failures propagate as-is; callers see
            // a stable vocabulary, not driver internals.
            AppError::Internal(error_msg)
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for log correlation
    pub error_id: String,
    pub message: String,
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

impl AppError {
    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "validation error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(error_id = error_id, "invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "authentication error");
            }
            AppError::Forbidden => {
                tracing::warn!(error_id = error_id, "forbidden access attempt");
            }
            AppError::NotFound(msg) => {
                tracing::info!(error_id = error_id, error = %msg, "not found");
            }
            AppError::Conflict(msg) => {
                tracing::warn!(error_id = error_id, error = %msg, "conflict");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        let status = self.status_code();
        let body = ErrorResponse::new(
            error_id,
            self.public_message(),
            self.code().to_string(),
            status.as_u16(),
        );

        HttpResponse::build(status).json(body)
    }
}
