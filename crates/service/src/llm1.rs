//! Stage-one extraction service.

use std::sync::Arc;

use serde_json::{Value, json};
use uuid::Uuid;

use triage_core::decode_llm_json_object;
use triage_llm::schema::Llm1Response;
use triage_llm::{CompletionClient, LlmError};
use triage_storage::{
    LlmStage, NewLlmInteraction, PROMPT_NAME_LLM1_SYSTEM, PROMPT_NAME_LLM1_USER, TranscriptStore,
};

use crate::error::{ServiceError, StageCause};
use crate::prompts::PromptTemplateService;

/// Validated stage-one artifacts ready for persistence.
#[derive(Debug, Clone)]
pub struct Llm1Result {
    pub structured_data: Value,
    pub summary_text: String,
    pub response: Llm1Response,
}

/// Execute the extraction call and enforce the v1.1 schema.
pub struct Llm1Service {
    client: Arc<dyn CompletionClient>,
    prompt_templates: Arc<PromptTemplateService>,
    transcripts: Arc<dyn TranscriptStore>,
}

impl Llm1Service {
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
        cleaned_text: &str,
    ) -> Result<Llm1Result, ServiceError> {
        let pair = self
            .prompt_templates
            .get_required_active_pair(
                PROMPT_NAME_LLM1_SYSTEM,
                PROMPT_NAME_LLM1_USER,
                StageCause::Llm1,
            )
            .await?;

        let user_prompt = render_user_prompt(
            &pair.user.content,
            case_id,
            agency_record_number,
            cleaned_text,
        );

        let raw_response = self
            .client
            .complete(&pair.system.content, &user_prompt)
            .await
            .map_err(map_llm_error)?;

        let decoded = decode_llm_json_object(&raw_response).map_err(|_| {
            ServiceError::stage(StageCause::Llm1, "LLM1 returned non-JSON payload")
        })?;
        let structured_data = Value::Object(decoded);

        let response: Llm1Response =
            serde_json::from_value(structured_data.clone()).map_err(|e| {
                ServiceError::stage(StageCause::Llm1, format!("LLM1 schema validation failed: {e}"))
            })?;
        response
            .validate()
            .map_err(|e| ServiceError::stage(StageCause::Llm1, e))?;

        if response.agency_record_number != agency_record_number {
            return Err(ServiceError::stage(
                StageCause::Llm1,
                "LLM1 agency_record_number mismatch",
            ));
        }

        self.transcripts
            .append_llm_interaction(NewLlmInteraction {
                case_id,
                stage: LlmStage::Llm1,
                input_payload: json!({
                    "case_id": case_id,
                    "agency_record_number": agency_record_number,
                    "cleaned_text": cleaned_text,
                }),
                output_payload: structured_data.clone(),
                prompt_system_name: pair.system.name.clone(),
                prompt_system_version: pair.system.version,
                prompt_user_name: pair.user.name.clone(),
                prompt_user_version: pair.user.version,
                model_name: self.client.model_name().to_owned(),
            })
            .await?;

        let summary_text = response.summary.one_liner.clone();
        Ok(Llm1Result { structured_data, summary_text, response })
    }
}

fn render_user_prompt(
    template: &str,
    case_id: Uuid,
    agency_record_number: &str,
    cleaned_text: &str,
) -> String {
    format!(
        "{template}\n\ncase_id: {case_id}\nagency_record_number: {agency_record_number}\n\nTexto do relatório (limpo):\n{cleaned_text}\n\nRetorne JSON schema_version 1.1.\nTodos os campos narrativos devem estar em português do Brasil (pt-BR)."
    )
}

fn map_llm_error(error: LlmError) -> ServiceError {
    ServiceError::stage(StageCause::Llm1, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_carries_case_identity() {
        let case_id = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let prompt = render_user_prompt("Extraia os dados.", case_id, "47773", "texto");

        assert!(prompt.starts_with("Extraia os dados."));
        assert!(prompt.contains("case_id: 11111111-1111-1111-1111-111111111111"));
        assert!(prompt.contains("agency_record_number: 47773"));
        assert!(prompt.contains("texto"));
    }
}
