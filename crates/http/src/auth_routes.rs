//! Opaque-token login endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use triage_core::Role;

use crate::AppState;
use crate::api_error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// `POST /auth/login`
pub(crate) async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.email.len() < 3 || request.password.is_empty() {
        return Err(ApiError::BadRequest("invalid email or password shape".to_owned()));
    }

    let user_agent = headers
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let issued = state
        .auth_service
        .login(
            &request.email,
            &request.password,
            forwarded_for.as_deref(),
            user_agent.as_deref(),
        )
        .await?;

    match issued {
        Ok(token) => Ok(Json(LoginResponse {
            token: token.token,
            role: token.role,
            expires_at: token.expires_at,
        })),
        Err(failure) => Err(failure.into()),
    }
}
