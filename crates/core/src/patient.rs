//! Patient context extraction from the stage-one structured payload.
//!
//! Room-3 and Room-1 messages identify cases by patient rather than UUID.
//! The structured payload may carry either English or pt-BR key spellings
//! depending on the prompt version that produced it.

use serde_json::Value;

/// Patient name and age from an LLM1 structured payload, when present.
pub fn extract_patient_name_age(structured_data: Option<&Value>) -> (Option<String>, Option<String>) {
    let Some(patient) = structured_data
        .and_then(|data| data.get("patient").or_else(|| data.get("paciente")))
        .and_then(Value::as_object)
    else {
        return (None, None);
    };

    let name = normalize_optional_string(patient.get("name"))
        .or_else(|| normalize_optional_string(patient.get("nome")));
    let age = normalize_age(patient.get("age")).or_else(|| normalize_age(patient.get("idade")));

    (name, age)
}

/// Requested exam/procedure name from an LLM1 structured payload.
pub fn extract_requested_exam(structured_data: Option<&Value>) -> Option<String> {
    let eda = structured_data?.get("eda")?;
    let requested =
        eda.get("requested_procedure").or_else(|| eda.get("procedimento_solicitado"))?;

    normalize_optional_string(requested.get("name"))
        .or_else(|| normalize_optional_string(requested.get("nome")))
}

fn normalize_optional_string(value: Option<&Value>) -> Option<String> {
    let normalized = value?.as_str()?.trim();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_owned())
    }
}

fn normalize_age(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(number) => Some(number.to_string()),
        Value::String(raw) => {
            let normalized = raw.trim();
            if normalized.is_empty() {
                None
            } else {
                Some(normalized.to_owned())
            }
        }
        _ => None,
    }
}
