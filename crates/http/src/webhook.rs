//! HMAC-signed doctor decision webhook.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{Value, json};

use triage_service::{DecisionOutcome, DecisionRequest};

use crate::api_error::ApiError;
use crate::hmac_auth::verify_hmac_signature;
use crate::AppState;

/// `POST /callbacks/triage-decision`
///
/// The signature covers the raw body; parse only after verification.
pub(crate) async fn triage_decision_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers.get("x-signature").and_then(|value| value.to_str().ok());
    if !verify_hmac_signature(&state.webhook_hmac_secret, &body, signature) {
        return Err(ApiError::Unauthorized("invalid signature".to_owned()));
    }

    let request: DecisionRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid payload: {e}")))?;
    request.validate().map_err(ApiError::BadRequest)?;

    match state.decision_service.handle(&request).await? {
        DecisionOutcome::Applied => Ok(Json(json!({"ok": true}))),
        DecisionOutcome::NotFound => Err(ApiError::NotFound("case not found".to_owned())),
        DecisionOutcome::WrongState { .. } => {
            Err(ApiError::Conflict("case not in WAIT_DOCTOR".to_owned()))
        }
    }
}
