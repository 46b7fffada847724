//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::backend::BackendError;
use crate::domain::DomainError;

/// Application-wide Result type; `Ok` and `Err` are the two halves of the
/// `{data, error}` envelope
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing or invalid access token")]
    Unauthenticated,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Remote database and auth failures
    #[error(transparent)]
    Backend(#[from] BackendError),

    // Server errors (5xx)
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// HTTP status and machine-readable code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),

            AppError::Domain(domain_err) => match domain_err {
                DomainError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "permission_denied"),
                DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                DomainError::Validation(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "validation_failed")
                }
                DomainError::CompanyUnavailable(_) => {
                    (StatusCode::NOT_FOUND, "company_unavailable")
                }
                DomainError::NotSignedIn => (StatusCode::UNAUTHORIZED, "not_signed_in"),
            },

            AppError::Backend(backend_err) => match backend_err {
                BackendError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                BackendError::Auth { status: 401, .. } => {
                    (StatusCode::UNAUTHORIZED, "auth_rejected")
                }
                BackendError::Auth { status, .. } if (400..500).contains(status) => {
                    (StatusCode::BAD_REQUEST, "auth_rejected")
                }
                BackendError::Auth { .. } | BackendError::Http(_) => {
                    (StatusCode::BAD_GATEWAY, "auth_unavailable")
                }
                BackendError::Rejected(_) => (StatusCode::BAD_GATEWAY, "backend_rejected"),
                BackendError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
                BackendError::Decode { .. }
                | BackendError::MultipleRows(_)
                | BackendError::InvalidIdentifier(_)
                | BackendError::InvalidRequest(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                }
            },

            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        }
    }

    /// Extra context safe to show to clients
    fn details(&self) -> Option<String> {
        match self {
            AppError::InvalidRequest(msg) => Some(msg.clone()),
            AppError::Domain(DomainError::NotFound { entity, id }) => {
                Some(format!("{} {}", entity, id))
            }
            AppError::Backend(BackendError::NotFound(table)) => Some(table.to_string()),
            _ => None,
        }
    }
}

// Extractor rejections keep the error envelope
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Error half of the envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error response body: `{"error": {...}}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // 5xx text may carry connection strings or SQL
        let message = if status.is_server_error() {
            tracing::error!(code, "Request failed: {:?}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: ErrorBody {
                message,
                code: code.to_string(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}
