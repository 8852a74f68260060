//! Stage-one extraction response schema v1.1.

use serde::{Deserialize, Serialize};

use super::{Confidence, Language, SchemaVersion, YesNoUnknown, validate_record_number};

/// Patient identity and demographic fields extracted by stage one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm1Patient {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    #[serde(default)]
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
    Outro,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm1RequestedProcedure {
    pub name: Option<String>,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Eletivo,
    Urgente,
    Emergente,
    Indefinido,
}

/// Laboratory values and provenance hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm1Labs {
    pub hb_g_dl: Option<f64>,
    pub platelets_per_mm3: Option<i64>,
    pub inr: Option<f64>,
    pub source_text_hint: Option<String>,
}

/// ECG availability and abnormality signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm1Ecg {
    pub report_present: YesNoUnknown,
    pub abnormal_flag: YesNoUnknown,
    pub source_text_hint: Option<String>,
}

/// ASA class estimate and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm1Asa {
    #[serde(rename = "class")]
    pub class_: AsaClass,
    pub confidence: Confidence,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsaClass {
    I,
    II,
    III,
    IV,
    V,
    #[serde(rename = "unknown")]
    Unknown,
}

/// Cardiovascular risk assessment and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm1CardiovascularRisk {
    pub level: RiskLevel,
    pub confidence: Confidence,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Unknown,
}

/// EDA-focused structured clinical extraction fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm1Eda {
    pub indication_category: IndicationCategory,
    pub exclusion_type: ExclusionType,
    pub is_pediatric: bool,
    pub foreign_body_suspected: bool,
    pub requested_procedure: Llm1RequestedProcedure,
    pub labs: Llm1Labs,
    pub ecg: Llm1Ecg,
    pub asa: Llm1Asa,
    pub cardiovascular_risk: Llm1CardiovascularRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicationCategory {
    ForeignBody,
    Bleeding,
    AbdominalPain,
    Dyspepsia,
    Other,
    Unknown,
}

impl IndicationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ForeignBody => "foreign_body",
            Self::Bleeding => "bleeding",
            Self::AbdominalPain => "abdominal_pain",
            Self::Dyspepsia => "dyspepsia",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionType {
    None,
    Gastrostomy,
    EsophagealDilation,
    Unknown,
}

/// Precheck flags consumed by deterministic policy reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm1PolicyPrecheck {
    pub excluded_from_eda_flow: bool,
    pub exclusion_reason: Option<String>,
    pub labs_required: bool,
    pub labs_pass: YesNoUnknown,
    pub labs_failed_items: Vec<String>,
    pub ecg_required: bool,
    pub ecg_present: YesNoUnknown,
    pub pediatric_flag: bool,
    pub notes: Option<String>,
}

/// Human-readable one-liner and supporting bullets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm1Summary {
    pub one_liner: String,
    pub bullet_points: Vec<String>,
}

/// Quality/confidence metadata for extraction completeness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm1ExtractionQuality {
    pub confidence: Confidence,
    pub missing_fields: Vec<String>,
    pub notes: Option<String>,
}

/// Top-level stage-one response schema v1.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Llm1Response {
    pub schema_version: SchemaVersion,
    pub language: Language,
    pub agency_record_number: String,
    pub patient: Llm1Patient,
    pub eda: Llm1Eda,
    pub policy_precheck: Llm1PolicyPrecheck,
    pub summary: Llm1Summary,
    pub extraction_quality: Llm1ExtractionQuality,
}

impl Llm1Response {
    /// Constraints serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        validate_record_number(&self.agency_record_number, "llm1")?;
        if let Some(age) = self.patient.age {
            if age > 130 {
                return Err(format!("llm1: patient.age out of range: {age}"));
            }
        }
        let bullets = self.summary.bullet_points.len();
        if !(3..=8).contains(&bullets) {
            return Err(format!("llm1: summary.bullet_points must have 3..=8 items, got {bullets}"));
        }
        Ok(())
    }

    /// Precheck block converted into the pure policy input.
    pub fn policy_precheck_input(&self) -> triage_core::PolicyPrecheck {
        triage_core::PolicyPrecheck {
            excluded_from_eda_flow: self.policy_precheck.excluded_from_eda_flow,
            indication_category: self.eda.indication_category.as_str().to_owned(),
            labs_required: self.policy_precheck.labs_required,
            labs_pass: self.policy_precheck.labs_pass.to_precheck_value(),
            ecg_required: self.policy_precheck.ecg_required,
            ecg_present: self.policy_precheck.ecg_present.to_precheck_value(),
            pediatric_flag: self.policy_precheck.pediatric_flag,
        }
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
            "agency_record_number": "47773",
            "patient": {"name": "Paciente", "age": 50, "sex": "F", "document_id": null},
            "eda": {
                "indication_category": "dyspepsia",
                "exclusion_type": "none",
                "is_pediatric": false,
                "foreign_body_suspected": false,
                "requested_procedure": {"name": "EDA", "urgency": "eletivo"},
                "labs": {"hb_g_dl": 10.5, "platelets_per_mm3": 130000, "inr": 1.2, "source_text_hint": null},
                "ecg": {"report_present": "yes", "abnormal_flag": "no", "source_text_hint": null},
                "asa": {"class": "II", "confidence": "media", "rationale": null},
                "cardiovascular_risk": {"level": "low", "confidence": "media", "rationale": null}
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
                "notes": null
            },
            "summary": {"one_liner": "Resumo", "bullet_points": ["a", "b", "c"]},
            "extraction_quality": {"confidence": "media", "missing_fields": [], "notes": null}
        })
    }

    #[test]
    fn valid_payload_deserializes_and_validates() {
        let response: Llm1Response = serde_json::from_value(valid_payload()).unwrap();
        response.validate().unwrap();
        assert_eq!(response.agency_record_number, "47773");
        assert_eq!(response.eda.indication_category, IndicationCategory::Dyspepsia);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut payload = valid_payload();
        payload["surprise"] = json!(1);
        assert!(serde_json::from_value::<Llm1Response>(payload).is_err());
    }

    #[test]
    fn unknown_nested_field_is_rejected() {
        let mut payload = valid_payload();
        payload["patient"]["cpf"] = json!("123");
        assert!(serde_json::from_value::<Llm1Response>(payload).is_err());
    }

    #[test]
    fn wrong_schema_version_is_rejected() {
        let mut payload = valid_payload();
        payload["schema_version"] = json!("1.0");
        assert!(serde_json::from_value::<Llm1Response>(payload).is_err());
    }

    #[test]
    fn short_record_number_fails_validation() {
        let mut payload = valid_payload();
        payload["agency_record_number"] = json!("1234");
        let response: Llm1Response = serde_json::from_value(payload).unwrap();
        assert!(response.validate().is_err());
    }

    #[test]
    fn epoch_millis_fallback_record_number_validates() {
        let mut payload = valid_payload();
        payload["agency_record_number"] = json!("1760000000123");
        let response: Llm1Response = serde_json::from_value(payload).unwrap();
        response.validate().unwrap();
    }

    #[test]
    fn too_few_bullet_points_fail_validation() {
        let mut payload = valid_payload();
        payload["summary"]["bullet_points"] = json!(["a"]);
        let response: Llm1Response = serde_json::from_value(payload).unwrap();
        assert!(response.validate().is_err());
    }
}
