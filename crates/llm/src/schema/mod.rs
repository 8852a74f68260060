//! Strict schema v1.1 models for both pipeline stages.
//!
//! Unknown fields are rejected everywhere (`deny_unknown_fields`); enum
//! values are closed sets. Constraints serde cannot express (digit patterns,
//! list lengths) live in each model's `validate`.

mod llm1;
mod llm2;

pub use llm1::{
    Llm1Asa, Llm1CardiovascularRisk, Llm1Ecg, Llm1Eda, Llm1ExtractionQuality, Llm1Labs,
    Llm1Patient, Llm1PolicyPrecheck, Llm1RequestedProcedure, Llm1Response, Llm1Summary,
};
pub use llm2::{Llm2PolicyAlignment, Llm2Rationale, Llm2Response};

use serde::{Deserialize, Serialize};

/// Schema revision marker; only v1.1 is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(rename = "1.1")]
    V1_1,
}

/// Output language marker; narratives must be pt-BR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "pt-BR")]
    PtBr,
}

/// Model self-reported confidence, in pt-BR as the prompts demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Alta,
    Media,
    Baixa,
}

/// Three-valued presence/pass answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YesNoUnknown {
    Yes,
    No,
    Unknown,
}

impl YesNoUnknown {
    pub fn to_precheck_value(self) -> triage_core::PolicyPrecheckValue {
        match self {
            Self::Yes => triage_core::PolicyPrecheckValue::Yes,
            Self::No => triage_core::PolicyPrecheckValue::No,
            Self::Unknown => triage_core::PolicyPrecheckValue::Unknown,
        }
    }
}

fn is_valid_record_number(value: &str) -> bool {
    value.len() >= 5 && value.chars().all(|c| c.is_ascii_digit())
}

pub(crate) fn validate_record_number(value: &str, context: &str) -> Result<(), String> {
    if is_valid_record_number(value) {
        Ok(())
    } else {
        Err(format!("{context}: agency_record_number must be 5+ digits, got {value:?}"))
    }
}
