//! HTTP API server (Axum) for the EDA triage bot.
//!
//! Surfaces: the HMAC-signed doctor decision webhook, opaque-token login,
//! the Room-2 widget bootstrap/submit endpoints, and the admin surface for
//! prompt templates and operator accounts.

pub mod api_error;
pub mod hmac_auth;

mod admin;
mod auth_routes;
mod webhook;
mod widget;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use triage_service::{
    AuthService, AuthenticatedUser, HandleDoctorDecisionService, PromptManagementService,
};
use triage_storage::{CaseStore, UserStore};

pub use api_error::ApiError;
pub use hmac_auth::{compute_hmac_sha256, verify_hmac_signature};

/// Shared handler state.
pub struct AppState {
    pub decision_service: Arc<HandleDoctorDecisionService>,
    pub auth_service: Arc<AuthService>,
    pub prompt_management: Arc<PromptManagementService>,
    pub cases: Arc<dyn CaseStore>,
    pub users: Arc<dyn UserStore>,
    pub webhook_hmac_secret: String,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/callbacks/triage-decision", post(webhook::triage_decision_callback))
        .route("/auth/login", post(auth_routes::login))
        .route("/widget/room2/bootstrap", post(widget::bootstrap))
        .route("/widget/room2/submit", post(widget::submit))
        .route("/admin/prompts", get(admin::list_prompts))
        .route("/admin/prompts/activate", post(admin::activate_prompt))
        .route("/admin/prompts/create", post(admin::create_prompt_version))
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/admin/users/status", post(admin::set_user_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Resolve the bearer token into an authenticated admin user.
pub(crate) async fn require_admin(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, ApiError> {
    let user = authenticate(state, headers).await?;
    AuthService::require_admin(&user)?;
    Ok(user)
}

pub(crate) async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, ApiError> {
    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer ")))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_owned()))?;

    match state.auth_service.authenticate_token(token).await? {
        Ok(user) => Ok(user),
        Err(failure) => Err(failure.into()),
    }
}
