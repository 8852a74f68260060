//! Stage-two suggestion service: schema enforcement, pt-BR language guard,
//! and deterministic policy reconciliation.

use std::sync::Arc;

use serde_json::{Value, json};
use uuid::Uuid;

use triage_core::{collect_forbidden_terms, decode_llm_json_object, reconcile_eda_policy};
use triage_llm::schema::{Llm1Response, Llm2Response};
use triage_llm::{CompletionClient, LlmError};
use triage_storage::{
    LlmStage, NewLlmInteraction, PROMPT_NAME_LLM2_SYSTEM, PROMPT_NAME_LLM2_USER, TranscriptStore,
};

use crate::error::{ServiceError, StageCause};
use crate::prompts::PromptTemplateService;

/// Validated, policy-reconciled stage-two artifacts ready for persistence.
#[derive(Debug, Clone)]
pub struct Llm2Result {
    /// Full suggestion payload with the reconciled suggestion/alignment.
    pub suggested_action: Value,
    /// Field overrides recorded by the reconciler.
    pub contradictions: Vec<triage_core::PolicyContradiction>,
}

/// Execute the suggestion call, enforce the v1.1 schema, and apply hard rules.
pub struct Llm2Service {
    client: Arc<dyn CompletionClient>,
    prompt_templates: Arc<PromptTemplateService>,
    transcripts: Arc<dyn TranscriptStore>,
}

impl Llm2Service {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        prompt_templates: Arc<PromptTemplateService>,
        transcripts: Arc<dyn TranscriptStore>,
    ) -> Self {
        Self { client, prompt_templates, transcripts }
    }

    pub async fn run(
        &self,
        case_id: Uuid,
        agency_record_number: &str,
        llm1_structured_data: &Value,
        prior_case_json: Option<&Value>,
    ) -> Result<Llm2Result, ServiceError> {
        let llm1_response: Llm1Response =
            serde_json::from_value(llm1_structured_data.clone()).map_err(|e| {
                ServiceError::stage(
                    StageCause::Llm2,
                    format!("LLM1 payload invalid for LLM2 input: {e}"),
                )
            })?;

        let pair = self
            .prompt_templates
            .get_required_active_pair(
                PROMPT_NAME_LLM2_SYSTEM,
                PROMPT_NAME_LLM2_USER,
                StageCause::Llm2,
            )
            .await?;

        let user_prompt = render_user_prompt(
            &pair.user.content,
            case_id,
            agency_record_number,
            llm1_structured_data,
            prior_case_json,
        );

        // The language guard grants exactly one in-call retry before the
        // failure escalates to the queue.
        let mut validated = self.complete_validated(&pair.system.content, &user_prompt).await?;
        let forbidden = collect_forbidden_terms(validated.narrative_texts());
        if !forbidden.is_empty() {
            tracing::warn!(
                case_id = %case_id,
                terms = ?forbidden,
                "LLM2 narrative contains English residue, retrying once"
            );
            validated = self.complete_validated(&pair.system.content, &user_prompt).await?;
            let persistent = collect_forbidden_terms(validated.narrative_texts());
            if !persistent.is_empty() {
                return Err(ServiceError::stage(
                    StageCause::Llm2,
                    format!("non-ptbr narrative terms: {}", persistent.join(", ")),
                ));
            }
        }

        if validated.case_id != case_id.to_string() {
            return Err(ServiceError::stage(StageCause::Llm2, "LLM2 case_id mismatch"));
        }
        if validated.agency_record_number != agency_record_number {
            return Err(ServiceError::stage(
                StageCause::Llm2,
                "LLM2 agency_record_number mismatch",
            ));
        }

        let policy_result = reconcile_eda_policy(
            &llm1_response.policy_precheck_input(),
            validated.suggestion.to_core(),
            &validated.policy_alignment_input(),
        );

        let mut suggested_action = serde_json::to_value(&validated)
            .map_err(|e| ServiceError::stage(StageCause::Llm2, e.to_string()))?;
        suggested_action["suggestion"] = json!(policy_result.suggestion.as_str());
        suggested_action["policy_alignment"] = json!({
            "excluded_request": policy_result.alignment.excluded_request,
            "labs_ok": policy_result.alignment.labs_ok.as_str(),
            "ecg_ok": policy_result.alignment.ecg_ok.as_str(),
            "pediatric_flag": policy_result.alignment.pediatric_flag,
            "notes": policy_result.alignment.notes,
        });

        self.transcripts
            .append_llm_interaction(NewLlmInteraction {
                case_id,
                stage: LlmStage::Llm2,
                input_payload: json!({
                    "case_id": case_id,
                    "agency_record_number": agency_record_number,
                    "llm1_structured_data": llm1_structured_data,
                    "prior_case": prior_case_json,
                }),
                output_payload: suggested_action.clone(),
                prompt_system_name: pair.system.name.clone(),
                prompt_system_version: pair.system.version,
                prompt_user_name: pair.user.name.clone(),
                prompt_user_version: pair.user.version,
                model_name: self.client.model_name().to_owned(),
            })
            .await?;

        Ok(Llm2Result { suggested_action, contradictions: policy_result.contradictions })
    }

    async fn complete_validated(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Llm2Response, ServiceError> {
        let raw_response = self
            .client
            .complete(system_prompt, user_prompt)
            .await
            .map_err(map_llm_error)?;

        let decoded = decode_llm_json_object(&raw_response).map_err(|_| {
            ServiceError::stage(StageCause::Llm2, "LLM2 returned non-JSON payload")
        })?;

        let validated: Llm2Response =
            serde_json::from_value(Value::Object(decoded)).map_err(|e| {
                ServiceError::stage(StageCause::Llm2, format!("LLM2 schema validation failed: {e}"))
            })?;
        validated
            .validate()
            .map_err(|e| ServiceError::stage(StageCause::Llm2, e))?;
        Ok(validated)
    }
}

fn render_user_prompt(
    template: &str,
    case_id: Uuid,
    agency_record_number: &str,
    llm1_structured_data: &Value,
    prior_case_json: Option<&Value>,
) -> String {
    let prior_case = prior_case_json.cloned().unwrap_or(Value::Null);
    format!(
        "{template}\n\ncase_id: {case_id}\nagency_record_number: {agency_record_number}\n\nDados extraídos (JSON LLM1):\n{llm1_structured_data}\n\nDecisão anterior (se houver):\n{prior_case}\n\nRetorne JSON schema_version 1.1 com policy_alignment e confidence.\nTodos os campos narrativos devem estar em português do Brasil (pt-BR)."
    )
}

fn map_llm_error(error: LlmError) -> ServiceError {
    ServiceError::stage(StageCause::Llm2, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_embeds_llm1_payload_and_prior_case() {
        let case_id = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let llm1 = json!({"schema_version": "1.1"});
        let prior = json!({"decision": "deny_triage"});

        let prompt = render_user_prompt("Sugira a conduta.", case_id, "47773", &llm1, Some(&prior));

        assert!(prompt.contains("case_id: 11111111-1111-1111-1111-111111111111"));
        assert!(prompt.contains("agency_record_number: 47773"));
        assert!(prompt.contains("deny_triage"));

        let without_prior = render_user_prompt("Sugira.", case_id, "47773", &llm1, None);
        assert!(without_prior.contains("Decisão anterior (se houver):\nnull"));
    }
}
