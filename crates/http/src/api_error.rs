//! Typed API error for HTTP handlers.
//!
//! Converts domain errors into JSON responses with stable status codes.
//! Handlers return `Result<Json<T>, ApiError>`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use triage_service::{AuthFailure, ServiceError};

/// API error with HTTP status code and human-readable message.
///
/// Converts to a JSON response body `{"error": "message"}`. The `Internal`
/// variant logs the real error server-side and returns a static message.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request — invalid input from caller.
    BadRequest(String),
    /// 401 Unauthorized — missing or invalid credentials/signature.
    Unauthorized(String),
    /// 403 Forbidden — authenticated but not allowed.
    Forbidden(String),
    /// 404 Not Found — requested resource doesn't exist.
    NotFound(String),
    /// 409 Conflict — resource is not in the expected state.
    Conflict(String),
    /// 500 Internal Server Error — unexpected failure; details logged only.
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
        };
        let body = serde_json::json!({"error": message});
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::CaseNotFound(case_id) => {
                Self::NotFound(format!("case '{case_id}' not found"))
            }
            ServiceError::InvalidPayload(msg) => Self::BadRequest(msg),
            other => Self::Internal(other.into()),
        }
    }
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::InvalidCredentials => {
                Self::Unauthorized("invalid credentials".to_owned())
            }
            AuthFailure::TokenInvalid => Self::Unauthorized("invalid token".to_owned()),
            AuthFailure::TokenExpired => Self::Unauthorized("token expired".to_owned()),
            AuthFailure::AccountNotActive => Self::Forbidden("account not active".to_owned()),
            AuthFailure::Forbidden => Self::Forbidden("admin role required".to_owned()),
        }
    }
}
