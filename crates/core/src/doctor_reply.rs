//! Strict parser for Room-2 doctor decision reply templates.
//!
//! Doctors answer by copying a bot-provided template, one `key: value` field
//! per line. Keys accept pt-BR and English aliases; anything outside the
//! template fails with a machine-readable reason code so the bot can
//! re-prompt precisely.

use thiserror::Error;
use uuid::Uuid;

use crate::decision::{DoctorDecision, SupportFlag};

const REQUIRED_KEYS: [&str; 4] = ["decision", "support_flag", "reason", "case_id"];

const EMPTY_REASON_MARKERS: [&str; 8] =
    ["", "(opcional)", "opcional", "(vazio)", "vazio", "-", "n/a", "na"];

/// Normalized doctor decision extracted from a strict template reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorDecisionReply {
    pub case_id: Uuid,
    pub decision: DoctorDecision,
    pub support_flag: SupportFlag,
    pub reason: Option<String>,
}

/// Deterministic parse failure; the message is the reason code.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct DoctorReplyParseError(pub String);

impl DoctorReplyParseError {
    fn new(reason: &str) -> Self {
        Self(reason.to_owned())
    }

    /// Machine-readable reason code.
    pub fn reason(&self) -> &str {
        &self.0
    }
}

fn normalize_key(raw_key: &str) -> Option<&'static str> {
    match raw_key {
        "decision" | "decisao" | "decisão" => Some("decision"),
        "support_flag" | "suporte" => Some("support_flag"),
        "reason" | "motivo" => Some("reason"),
        "case_id" | "caso" => Some("case_id"),
        _ => None,
    }
}

fn parse_decision(raw: &str) -> Option<DoctorDecision> {
    match raw {
        "accept" | "aceitar" | "aceito" | "aceita" => Some(DoctorDecision::Accept),
        "deny" | "negar" | "negado" | "negar." => Some(DoctorDecision::Deny),
        _ => None,
    }
}

fn parse_support_flag(raw: &str) -> Option<SupportFlag> {
    match raw {
        "none" | "nenhum" => Some(SupportFlag::None),
        "anesthesist" | "anestesista" => Some(SupportFlag::Anesthesist),
        "anesthesist_icu" | "anestesista_uti" | "anestesista_icu" => {
            Some(SupportFlag::AnesthesistIcu)
        }
        _ => None,
    }
}

fn normalized_message_lines(body: &str) -> Vec<&str> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```"))
        .collect()
}

fn normalize_reason(raw: &str) -> Option<String> {
    let normalized = raw.trim();
    if EMPTY_REASON_MARKERS.contains(&normalized.to_lowercase().as_str()) {
        None
    } else {
        Some(normalized.to_owned())
    }
}

/// Parse a strict Room-2 doctor decision reply.
///
/// When `expected_case_id` is given, a well-formed reply for another case
/// fails with `case_id_mismatch`.
pub fn parse_doctor_decision_reply(
    body: &str,
    expected_case_id: Option<Uuid>,
) -> Result<DoctorDecisionReply, DoctorReplyParseError> {
    let lines = normalized_message_lines(body);
    if lines.is_empty() {
        return Err(DoctorReplyParseError::new("empty_message"));
    }

    let mut fields: Vec<(&'static str, String)> = Vec::new();
    for line in lines {
        let normalized_line = line.replace('：', ":");
        let Some((key_raw, value)) = normalized_line.split_once(':') else {
            return Err(DoctorReplyParseError::new("invalid_line_format"));
        };
        let Some(key) = normalize_key(&key_raw.trim().to_lowercase()) else {
            return Err(DoctorReplyParseError::new("unknown_field"));
        };
        if fields.iter().any(|(existing, _)| *existing == key) {
            return Err(DoctorReplyParseError::new("duplicate_field"));
        }
        fields.push((key, value.trim().to_owned()));
    }

    for required in REQUIRED_KEYS {
        if !fields.iter().any(|(key, _)| *key == required) {
            return Err(DoctorReplyParseError(format!("missing_{required}_line")));
        }
    }

    let value_of = |key: &str| -> &str {
        fields
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, value)| value.as_str())
            .unwrap_or_default()
    };

    let decision = parse_decision(&value_of("decision").to_lowercase())
        .ok_or_else(|| DoctorReplyParseError::new("invalid_decision_value"))?;

    let support_flag = parse_support_flag(&value_of("support_flag").to_lowercase())
        .ok_or_else(|| DoctorReplyParseError::new("invalid_support_flag_value"))?;

    if decision == DoctorDecision::Deny && support_flag != SupportFlag::None {
        return Err(DoctorReplyParseError::new("invalid_support_flag_for_decision"));
    }

    let case_id = Uuid::parse_str(value_of("case_id"))
        .map_err(|_| DoctorReplyParseError::new("invalid_case_line"))?;
    if expected_case_id.is_some_and(|expected| expected != case_id) {
        return Err(DoctorReplyParseError::new("case_id_mismatch"));
    }

    let reason = normalize_reason(value_of("reason"));

    Ok(DoctorDecisionReply { case_id, decision, support_flag, reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CASE: &str = "11111111-1111-1111-1111-111111111111";

    fn template(decision: &str, support: &str, reason: &str) -> String {
        format!("decisao: {decision}\nsuporte: {support}\nmotivo: {reason}\ncaso: {CASE}")
    }

    #[test]
    fn accepts_ptbr_template_with_aliases() {
        let parsed =
            parse_doctor_decision_reply(&template("aceitar", "anestesista", "apto"), None).unwrap();

        assert_eq!(parsed.decision, DoctorDecision::Accept);
        assert_eq!(parsed.support_flag, SupportFlag::Anesthesist);
        assert_eq!(parsed.reason.as_deref(), Some("apto"));
        assert_eq!(parsed.case_id, Uuid::parse_str(CASE).unwrap());
    }

    #[test]
    fn accepts_english_keys_case_insensitively() {
        let body = format!(
            "Decision: deny\nSupport_Flag: none\nReason: sem laudo\nCase_Id: {CASE}"
        );
        let parsed = parse_doctor_decision_reply(&body, None).unwrap();

        assert_eq!(parsed.decision, DoctorDecision::Deny);
        assert_eq!(parsed.support_flag, SupportFlag::None);
    }

    #[test]
    fn optional_reason_markers_become_none() {
        for marker in ["(opcional)", "-", "N/A", "vazio"] {
            let parsed =
                parse_doctor_decision_reply(&template("aceitar", "nenhum", marker), None).unwrap();
            assert_eq!(parsed.reason, None, "marker {marker}");
        }
    }

    #[test]
    fn code_fences_are_skipped() {
        let body = format!("```\ndecisao: aceitar\nsuporte: nenhum\nmotivo: -\ncaso: {CASE}\n```");
        assert!(parse_doctor_decision_reply(&body, None).is_ok());
    }

    #[test]
    fn deny_with_support_is_rejected() {
        let err = parse_doctor_decision_reply(&template("negar", "anestesista", "-"), None)
            .unwrap_err();
        assert_eq!(err.reason(), "invalid_support_flag_for_decision");
    }

    #[test]
    fn invalid_decision_value_is_reported() {
        let err =
            parse_doctor_decision_reply(&template("talvez", "nenhum", "-"), None).unwrap_err();
        assert_eq!(err.reason(), "invalid_decision_value");
    }

    #[test]
    fn missing_case_line_is_reported() {
        let err = parse_doctor_decision_reply("decisao: aceitar\nsuporte: nenhum\nmotivo: -", None)
            .unwrap_err();
        assert_eq!(err.reason(), "missing_case_id_line");
    }

    #[test]
    fn duplicate_field_is_reported() {
        let body = format!("decisao: aceitar\ndecision: deny\nsuporte: nenhum\nmotivo: -\ncaso: {CASE}");
        let err = parse_doctor_decision_reply(&body, None).unwrap_err();
        assert_eq!(err.reason(), "duplicate_field");
    }

    #[test]
    fn case_mismatch_is_reported_when_expected_id_given() {
        let other = Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap();
        let err = parse_doctor_decision_reply(&template("aceitar", "nenhum", "-"), Some(other))
            .unwrap_err();
        assert_eq!(err.reason(), "case_id_mismatch");
    }

    #[test]
    fn free_text_line_is_invalid_format() {
        let err = parse_doctor_decision_reply("ok pode marcar", None).unwrap_err();
        assert_eq!(err.reason(), "invalid_line_format");
    }
}
