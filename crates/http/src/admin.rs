//! Admin surface: prompt template catalog and operator accounts.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use triage_core::{AccountStatus, Role};

use crate::AppState;
use crate::api_error::ApiError;
use crate::require_admin;

fn internal(err: impl std::error::Error + Send + Sync + 'static) -> ApiError {
    ApiError::Internal(anyhow::Error::new(err))
}

/// `GET /admin/prompts`
pub(crate) async fn list_prompts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let versions = state.prompt_management.list_versions().await?;
    Ok(Json(json!({"prompts": versions})))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ActivatePromptRequest {
    pub name: String,
    pub version: i32,
}

/// `POST /admin/prompts/activate`
pub(crate) async fn activate_prompt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ActivatePromptRequest>,
) -> Result<Json<Value>, ApiError> {
    let actor = require_admin(&state, &headers).await?;

    match state
        .prompt_management
        .activate_version(&request.name, request.version, Some(actor.user_id))
        .await?
    {
        Ok(record) => Ok(Json(json!({"activated": record}))),
        Err(missing) => Err(ApiError::NotFound(missing.to_string())),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreatePromptVersionRequest {
    pub name: String,
    pub source_version: i32,
    pub content: String,
}

/// `POST /admin/prompts/create`: derive a new immutable version.
pub(crate) async fn create_prompt_version(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreatePromptVersionRequest>,
) -> Result<Json<Value>, ApiError> {
    let actor = require_admin(&state, &headers).await?;

    if request.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content must not be empty".to_owned()));
    }

    match state
        .prompt_management
        .create_version_from(&request.name, request.source_version, &request.content, actor.user_id)
        .await?
    {
        Ok(record) => Ok(Json(json!({"created": record}))),
        Err(missing) => Err(ApiError::NotFound(missing.to_string())),
    }
}

/// `GET /admin/users`
pub(crate) async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let users = state.users.list_users().await.map_err(internal)?;
    let listed: Vec<Value> = users
        .into_iter()
        .map(|user| {
            json!({
                "user_id": user.user_id,
                "email": user.email,
                "role": user.role.as_str(),
                "account_status": user.account_status.as_str(),
            })
        })
        .collect();
    Ok(Json(json!({"users": listed})))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// `POST /admin/users`
pub(crate) async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;

    if request.email.len() < 3 || request.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "email must be valid and password at least 8 chars".to_owned(),
        ));
    }

    let user = state
        .auth_service
        .create_user(&request.email, &request.password, request.role)
        .await?;
    Ok(Json(json!({
        "user_id": user.user_id,
        "email": user.email,
        "role": user.role.as_str(),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SetUserStatusRequest {
    pub user_id: Uuid,
    pub account_status: AccountStatus,
}

/// `POST /admin/users/status`
pub(crate) async fn set_user_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SetUserStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;

    match state
        .users
        .set_account_status(request.user_id, request.account_status)
        .await
        .map_err(internal)?
    {
        Some(user) => Ok(Json(json!({
            "user_id": user.user_id,
            "account_status": user.account_status.as_str(),
        }))),
        None => Err(ApiError::NotFound("user not found".to_owned())),
    }
}
