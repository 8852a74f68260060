//! Authenticated Room-2 widget bootstrap and submit endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use triage_core::CaseStatus;
use triage_service::{DecisionOutcome, DecisionRequest};

use crate::AppState;
use crate::api_error::ApiError;
use crate::require_admin;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BootstrapRequest {
    pub case_id: Uuid,
}

/// `POST /widget/room2/bootstrap`: widget context for one waiting case.
pub(crate) async fn bootstrap(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<BootstrapRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;

    let Some(case) = state.cases.get_case(request.case_id).await.map_err(|e| {
        ApiError::Internal(anyhow::Error::new(e))
    })? else {
        return Err(ApiError::NotFound("case not found".to_owned()));
    };
    if case.status != CaseStatus::WaitDoctor {
        return Err(ApiError::Conflict("case not in WAIT_DOCTOR".to_owned()));
    }

    Ok(Json(json!({
        "case_id": case.case_id,
        "status": case.status.as_str(),
        "agency_record_number": case.agency_record_number,
        "summary_text": case.summary_text,
        "structured_data": case.structured_data,
        "suggested_action": case.suggested_action,
    })))
}

/// `POST /widget/room2/submit`: same decision payload as the webhook.
pub(crate) async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    request.validate().map_err(ApiError::BadRequest)?;

    match state.decision_service.handle(&request).await? {
        DecisionOutcome::Applied => Ok(Json(json!({"ok": true}))),
        DecisionOutcome::NotFound => Err(ApiError::NotFound("case not found".to_owned())),
        DecisionOutcome::WrongState { .. } => {
            Err(ApiError::Conflict("case not in WAIT_DOCTOR".to_owned()))
        }
    }
}
