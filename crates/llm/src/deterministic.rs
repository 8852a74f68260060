//! Deterministic stage clients for runtime smoke validation.
//!
//! With `LLM_RUNTIME_MODE=deterministic` the pipeline runs end to end without
//! a provider: each stage returns fixed, schema-valid JSON that echoes the
//! `case_id` and `agency_record_number` found in the user prompt.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use crate::client::CompletionClient;
use crate::error::LlmError;

/// Pipeline stage the deterministic client stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeterministicStage {
    Llm1,
    Llm2,
}

/// Deterministic stage-specific completion client.
#[derive(Debug, Clone, Copy)]
pub struct DeterministicClient {
    stage: DeterministicStage,
}

impl DeterministicClient {
    pub fn new(stage: DeterministicStage) -> Self {
        Self { stage }
    }
}

fn case_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"case_id:\s*([0-9a-fA-F-]{36})").expect("static regex"))
}

fn record_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"agency_record_number:\s*([0-9]{5,})").expect("static regex")
    })
}

fn extract_case_id(user_prompt: &str) -> Result<String, LlmError> {
    case_id_pattern()
        .captures(user_prompt)
        .map(|c| c.get(1).expect("capture").as_str().to_owned())
        .ok_or_else(|| LlmError::Deterministic("prompt missing case_id".to_owned()))
}

fn extract_record_number(user_prompt: &str) -> Result<String, LlmError> {
    record_number_pattern()
        .captures(user_prompt)
        .map(|c| c.get(1).expect("capture").as_str().to_owned())
        .ok_or_else(|| LlmError::Deterministic("prompt missing agency_record_number".to_owned()))
}

fn build_llm1_payload(user_prompt: &str) -> Result<String, LlmError> {
    let record_number = extract_record_number(user_prompt)?;
    let payload = json!({
        "schema_version": "1.1",
        "language": "pt-BR",
        "agency_record_number": record_number,
        "patient": {"name": "Paciente", "age": 50, "sex": "F", "document_id": null},
        "eda": {
            "indication_category": "dyspepsia",
            "exclusion_type": "none",
            "is_pediatric": false,
            "foreign_body_suspected": false,
            "requested_procedure": {"name": "EDA", "urgency": "eletivo"},
            "labs": {
                "hb_g_dl": 11.0,
                "platelets_per_mm3": 180_000,
                "inr": 1.1,
                "source_text_hint": "deterministic"
            },
            "ecg": {
                "report_present": "yes",
                "abnormal_flag": "no",
                "source_text_hint": "deterministic"
            },
            "asa": {"class": "II", "confidence": "media", "rationale": "deterministic"},
            "cardiovascular_risk": {
                "level": "low",
                "confidence": "media",
                "rationale": "deterministic"
            }
        },
        "policy_precheck": {
            "excluded_from_eda_flow": false,
            "exclusion_reason": null,
            "labs_required": true,
            "labs_pass": "yes",
            "labs_failed_items": [],
            "ecg_required": true,
            "ecg_present": "yes",
            "pediatric_flag": false,
            "notes": "deterministic"
        },
        "summary": {
            "one_liner": "Resumo deterministico para validacao de runtime",
            "bullet_points": [
                "deterministico passo 1",
                "deterministico passo 2",
                "deterministico passo 3"
            ]
        },
        "extraction_quality": {"confidence": "media", "missing_fields": [], "notes": null}
    });
    Ok(payload.to_string())
}

fn build_llm2_payload(user_prompt: &str) -> Result<String, LlmError> {
    let case_id = extract_case_id(user_prompt)?;
    let record_number = extract_record_number(user_prompt)?;
    let payload = json!({
        "schema_version": "1.1",
        "language": "pt-BR",
        "case_id": case_id,
        "agency_record_number": record_number,
        "suggestion": "accept",
        "support_recommendation": "none",
        "rationale": {
            "short_reason": "Deterministico: criterios minimos atendidos",
            "details": ["deterministico detalhe 1", "deterministico detalhe 2"],
            "missing_info_questions": []
        },
        "policy_alignment": {
            "excluded_request": false,
            "labs_ok": "yes",
            "ecg_ok": "yes",
            "pediatric_flag": false,
            "notes": "deterministico"
        },
        "confidence": "media"
    });
    Ok(payload.to_string())
}

#[async_trait]
impl CompletionClient for DeterministicClient {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        match self.stage {
            DeterministicStage::Llm1 => build_llm1_payload(user_prompt),
            DeterministicStage::Llm2 => build_llm2_payload(user_prompt),
        }
    }

    fn model_name(&self) -> &str {
        match self.stage {
            DeterministicStage::Llm1 => "deterministic-llm1",
            DeterministicStage::Llm2 => "deterministic-llm2",
        }
    }
}
