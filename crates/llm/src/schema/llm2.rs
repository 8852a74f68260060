//! Stage-two suggestion response schema v1.1.

use serde::{Deserialize, Serialize};

use triage_core::{PolicyAlignment, PolicyAlignmentValue, Suggestion};

use super::{Confidence, Language, SchemaVersion, validate_record_number};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm2Rationale {
    pub short_reason: String,
    pub details: Vec<String>,
    pub missing_info_questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm2PolicyAlignment {
    pub excluded_request: bool,
    pub labs_ok: AlignmentValue,
    pub ecg_ok: AlignmentValue,
    pub pediatric_flag: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentValue {
    Yes,
    No,
    Unknown,
    NotRequired,
}

impl AlignmentValue {
    pub fn to_core(self) -> PolicyAlignmentValue {
        match self {
            Self::Yes => PolicyAlignmentValue::Yes,
            Self::No => PolicyAlignmentValue::No,
            Self::Unknown => PolicyAlignmentValue::Unknown,
            Self::NotRequired => PolicyAlignmentValue::NotRequired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionValue {
    Accept,
    Deny,
}

impl SuggestionValue {
    pub fn to_core(self) -> Suggestion {
        match self {
            Self::Accept => Suggestion::Accept,
            Self::Deny => Suggestion::Deny,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportRecommendation {
    None,
    Anesthesist,
    AnesthesistIcu,
    Unknown,
}

/// Top-level stage-two response schema v1.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm2Response {
    pub schema_version: SchemaVersion,
    pub language: Language,
    pub case_id: String,
    pub agency_record_number: String,
    pub suggestion: SuggestionValue,
    pub support_recommendation: SupportRecommendation,
    pub rationale: Llm2Rationale,
    pub policy_alignment: Llm2PolicyAlignment,
    pub confidence: Confidence,
}

impl Llm2Response {
    /// Constraints serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        validate_record_number(&self.agency_record_number, "llm2")?;
        if self.rationale.short_reason.chars().count() > 280 {
            return Err("llm2: rationale.short_reason exceeds 280 chars".to_owned());
        }
        let details = self.rationale.details.len();
        if !(2..=6).contains(&details) {
            return Err(format!("llm2: rationale.details must have 2..=6 items, got {details}"));
        }
        if self.rationale.missing_info_questions.len() > 6 {
            return Err("llm2: rationale.missing_info_questions exceeds 6 items".to_owned());
        }
        Ok(())
    }

    /// Alignment block converted into the pure policy input.
    pub fn policy_alignment_input(&self) -> PolicyAlignment {
        PolicyAlignment {
            excluded_request: self.policy_alignment.excluded_request,
            labs_ok: self.policy_alignment.labs_ok.to_core(),
            ecg_ok: self.policy_alignment.ecg_ok.to_core(),
            pediatric_flag: self.policy_alignment.pediatric_flag,
            notes: self.policy_alignment.notes.clone(),
        }
    }

    /// Narrative fields scanned by the pt-BR language guard.
    pub fn narrative_texts(&self) -> Vec<&str> {
        let mut texts = vec![self.rationale.short_reason.as_str()];
        texts.extend(self.rationale.details.iter().map(String::as_str));
        texts.extend(self.rationale.missing_info_questions.iter().map(String::as_str));
        if let Some(notes) = &self.policy_alignment.notes {
            texts.push(notes.as_str());
        }
        texts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> serde_json::Value {
        json!({
            "schema_version": "1.1",
            "language": "pt-BR",
            "case_id": "11111111-1111-1111-1111-111111111111",
            "agency_record_number": "47773",
            "suggestion": "accept",
            "support_recommendation": "none",
            "rationale": {
                "short_reason": "Apto para fluxo padrao",
                "details": ["criterio 1", "criterio 2"],
                "missing_info_questions": []
            },
            "policy_alignment": {
                "excluded_request": false,
                "labs_ok": "yes",
                "ecg_ok": "yes",
                "pediatric_flag": false,
                "notes": null
            },
            "confidence": "media"
        })
    }

    #[test]
    fn valid_payload_deserializes_and_validates() {
        let response: Llm2Response = serde_json::from_value(valid_payload()).unwrap();
        response.validate().unwrap();
        assert_eq!(response.suggestion, SuggestionValue::Accept);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut payload = valid_payload();
        payload["extra"] = json!("nope");
        assert!(serde_json::from_value::<Llm2Response>(payload).is_err());
    }

    #[test]
    fn single_detail_fails_validation() {
        let mut payload = valid_payload();
        payload["rationale"]["details"] = json!(["so um"]);
        let response: Llm2Response = serde_json::from_value(payload).unwrap();
        assert!(response.validate().is_err());
    }

    #[test]
    fn narrative_texts_cover_rationale_and_notes() {
        let mut payload = valid_payload();
        payload["policy_alignment"]["notes"] = json!("nota de alinhamento");
        let response: Llm2Response = serde_json::from_value(payload).unwrap();

        let texts = response.narrative_texts();
        assert!(texts.contains(&"Apto para fluxo padrao"));
        assert!(texts.contains(&"nota de alinhamento"));
    }
}
