//! Strict parser for Room-3 scheduler reply templates.
//!
//! Two accepted shapes: a status-labelled template (`status: confirmado` plus
//! date/location/instruction lines) and the positional template whose first
//! line is either the confirmed datetime or the word `denied`/`negado`. Keys
//! tolerate pt-BR aliases, diacritics, and light markup decoration.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::America::Bahia;
use regex::Regex;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;
use uuid::Uuid;

use crate::decision::AppointmentStatus;

const EMPTY_REASON_MARKERS: [&str; 8] =
    ["", "(opcional)", "opcional", "(vazio)", "vazio", "-", "n/a", "na"];

/// Normalized scheduler reply fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerReply {
    pub case_id: Uuid,
    pub appointment_status: AppointmentStatus,
    pub appointment_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub instructions: Option<String>,
    pub reason: Option<String>,
}

/// Deterministic parse failure; the message is the reason code.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct SchedulerReplyParseError(pub String);

impl SchedulerReplyParseError {
    fn new(reason: &str) -> Self {
        Self(reason.to_owned())
    }

    pub fn reason(&self) -> &str {
        &self.0
    }
}

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})")
            .expect("static regex")
    })
}

fn strip_diacritics(value: &str) -> String {
    value.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

fn normalize_key(raw_key: &str) -> String {
    let mut key = raw_key.trim().to_lowercase();
    key = key.trim_matches(|c: char| "`*_ ".contains(c)).to_owned();
    key = key
        .trim_start_matches(|c: char| {
            "->–—*•.)( ".contains(c) || c.is_ascii_digit()
        })
        .to_owned();
    key = key.replace(['-', '/', ' '], "_");
    key = strip_diacritics(&key);
    let collapsed = key.split('_').filter(|part| !part.is_empty()).collect::<Vec<_>>().join("_");
    collapsed
}

fn canonical_key(normalized: &str) -> Option<&'static str> {
    match normalized {
        "case" | "caso" => Some("case"),
        "status" | "situacao" | "estado" => Some("status"),
        "data_hora" | "datahora" | "datetime" | "data_hora_brt" | "data_hora_local" => {
            Some("date_time")
        }
        "location" | "local" => Some("location"),
        "instructions" | "instrucoes" => Some("instructions"),
        "reason" | "motivo" => Some("reason"),
        _ => None,
    }
}

fn normalized_message_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```") && !line.starts_with('>'))
        .map(str::to_owned)
        .collect()
}

fn labeled_values(lines: &[String]) -> Vec<(&'static str, String)> {
    let mut labeled = Vec::new();
    for raw_line in lines {
        let normalized_line = raw_line.replace('：', ":");
        let Some((raw_key, raw_value)) = normalized_line.split_once(':') else {
            continue;
        };
        let Some(key) = canonical_key(&normalize_key(raw_key)) else {
            continue;
        };
        labeled.push((key, raw_value.trim().to_owned()));
    }
    labeled
}

fn extract_value(lines: &[String], key: &str) -> Option<String> {
    let mut value: Option<String> = None;
    for (line_key, line_value) in labeled_values(lines) {
        if line_key != key {
            continue;
        }
        if !line_value.is_empty() {
            value = Some(line_value);
        } else if value.is_none() {
            value = Some(String::new());
        }
    }
    value
}

fn extract_required_value(
    lines: &[String],
    key: &str,
) -> Result<String, SchedulerReplyParseError> {
    match extract_value(lines, key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(SchedulerReplyParseError(format!("missing_{key}_line"))),
    }
}

fn extract_case_id(lines: &[String]) -> Result<Uuid, SchedulerReplyParseError> {
    let mut value = extract_required_value(lines, "case")
        .map_err(|_| SchedulerReplyParseError::new("missing_case_line"))?;
    if let Some(captures) = uuid_pattern().captures(&value) {
        value = captures.get(1).expect("capture").as_str().to_owned();
    }
    Uuid::parse_str(&value).map_err(|_| SchedulerReplyParseError::new("invalid_case_line"))
}

fn normalize_reason(reason: Option<String>) -> Option<String> {
    let normalized = reason?.trim().to_owned();
    if EMPTY_REASON_MARKERS.contains(&normalized.to_lowercase().as_str()) {
        None
    } else {
        Some(normalized)
    }
}

fn parse_brt_datetime(line: &str) -> Result<DateTime<Utc>, SchedulerReplyParseError> {
    let mut value = line.trim().replace('：', ":");
    value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    value = value.trim_matches('`').to_owned();
    let lowered = value.to_lowercase();
    for suffix in [" brt.", " brt"] {
        if lowered.ends_with(suffix) {
            value = value[..value.len() - suffix.len()].trim_end().to_owned();
            break;
        }
    }

    for format in ["%d-%m-%Y %H:%M", "%d/%m/%Y %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&value, format) {
            return match Bahia.from_local_datetime(&naive).earliest() {
                Some(local) => Ok(local.with_timezone(&Utc)),
                None => Err(SchedulerReplyParseError::new("invalid_confirmed_datetime")),
            };
        }
    }
    Err(SchedulerReplyParseError::new("invalid_confirmed_datetime"))
}

/// Normalize optional section-header lines used in the Room-3 templates.
fn strip_section_headers(lines: Vec<String>) -> Vec<String> {
    let Some(first) = lines.first() else {
        return lines;
    };
    let first_lower = first.trim().to_lowercase();
    if ["confirmed", "confirmed:", "confirmado", "confirmado:"].contains(&first_lower.as_str()) {
        return lines[1..].to_vec();
    }
    if ["denied:", "negado:"].contains(&first_lower.as_str()) {
        if lines.len() >= 2 && ["denied", "negado"].contains(&lines[1].trim().to_lowercase().as_str())
        {
            return lines[1..].to_vec();
        }
        let mut rewritten = vec!["denied".to_owned()];
        rewritten.extend_from_slice(&lines[1..]);
        return rewritten;
    }
    lines
}

fn parse_status_template(
    lines: &[String],
    expected_case_id: Uuid,
) -> Result<SchedulerReply, SchedulerReplyParseError> {
    let case_id = extract_case_id(lines)?;
    if case_id != expected_case_id {
        return Err(SchedulerReplyParseError::new("case_id_mismatch"));
    }

    let status_raw = extract_required_value(lines, "status")?.trim().to_lowercase();
    if ["confirmado", "confirmed"].contains(&status_raw.as_str()) {
        let date_time_raw = extract_required_value(lines, "date_time")?;
        let appointment_at = parse_brt_datetime(&date_time_raw)?;
        let location = extract_required_value(lines, "location")?;
        let instructions = extract_required_value(lines, "instructions")?;
        return Ok(SchedulerReply {
            case_id,
            appointment_status: AppointmentStatus::Confirmed,
            appointment_at: Some(appointment_at),
            location: Some(location),
            instructions: Some(instructions),
            reason: None,
        });
    }

    if ["negado", "denied"].contains(&status_raw.as_str()) {
        return Ok(SchedulerReply {
            case_id,
            appointment_status: AppointmentStatus::Denied,
            appointment_at: None,
            location: None,
            instructions: None,
            reason: normalize_reason(extract_value(lines, "reason")),
        });
    }

    Err(SchedulerReplyParseError::new("invalid_status_value"))
}

/// Parse a denied/confirmed scheduler reply for a specific case.
pub fn parse_scheduler_reply(
    body: &str,
    expected_case_id: Uuid,
) -> Result<SchedulerReply, SchedulerReplyParseError> {
    let lines = normalized_message_lines(body);
    if lines.is_empty() {
        return Err(SchedulerReplyParseError::new("empty_message"));
    }

    if extract_value(&lines, "status").is_some() {
        return parse_status_template(&lines, expected_case_id);
    }

    let case_id = extract_case_id(&lines)?;
    if case_id != expected_case_id {
        return Err(SchedulerReplyParseError::new("case_id_mismatch"));
    }

    let parsed_lines = strip_section_headers(lines);
    let Some(first_line) = parsed_lines.first() else {
        return Err(SchedulerReplyParseError::new("empty_message"));
    };

    if ["denied", "negado"].contains(&first_line.trim().to_lowercase().as_str()) {
        return Ok(SchedulerReply {
            case_id,
            appointment_status: AppointmentStatus::Denied,
            appointment_at: None,
            location: None,
            instructions: None,
            reason: normalize_reason(extract_value(&parsed_lines, "reason")),
        });
    }

    let appointment_at = parse_brt_datetime(first_line)?;
    let location = extract_required_value(&parsed_lines, "location")?;
    let instructions = extract_required_value(&parsed_lines, "instructions")?;

    Ok(SchedulerReply {
        case_id,
        appointment_status: AppointmentStatus::Confirmed,
        appointment_at: Some(appointment_at),
        location: Some(location),
        instructions: Some(instructions),
        reason: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CASE: &str = "11111111-1111-1111-1111-111111111111";

    fn case_id() -> Uuid {
        Uuid::parse_str(CASE).unwrap()
    }

    #[test]
    fn positional_confirmed_template_parses_brt_datetime() {
        let body =
            format!("16-02-2026 14:30 BRT\nlocal: Sala 2\ninstrucoes: Jejum 8h\ncaso: {CASE}");

        let parsed = parse_scheduler_reply(&body, case_id()).unwrap();

        assert_eq!(parsed.appointment_status, AppointmentStatus::Confirmed);
        // America/Bahia is UTC-3 year round.
        let expected = Utc.with_ymd_and_hms(2026, 2, 16, 17, 30, 0).unwrap();
        assert_eq!(parsed.appointment_at, Some(expected));
        assert_eq!(parsed.location.as_deref(), Some("Sala 2"));
        assert_eq!(parsed.instructions.as_deref(), Some("Jejum 8h"));
    }

    #[test]
    fn slash_format_without_suffix_is_accepted() {
        let body = format!("16/02/2026 08:00\nlocal: Centro\ninstrucoes: Chegar cedo\ncaso: {CASE}");

        let parsed = parse_scheduler_reply(&body, case_id()).unwrap();

        let expected = Utc.with_ymd_and_hms(2026, 2, 16, 11, 0, 0).unwrap();
        assert_eq!(parsed.appointment_at, Some(expected));
    }

    #[test]
    fn status_template_confirmed_with_accented_keys() {
        let body = format!(
            "status: confirmado\ndata_hora: 16-02-2026 14:30 BRT\nlocal: Sala 2\ninstruções: Jejum\ncaso: {CASE}"
        );

        let parsed = parse_scheduler_reply(&body, case_id()).unwrap();

        assert_eq!(parsed.appointment_status, AppointmentStatus::Confirmed);
        assert_eq!(parsed.instructions.as_deref(), Some("Jejum"));
    }

    #[test]
    fn status_template_denied_with_optional_reason() {
        let body = format!("status: negado\nmotivo: agenda cheia\ncaso: {CASE}");

        let parsed = parse_scheduler_reply(&body, case_id()).unwrap();

        assert_eq!(parsed.appointment_status, AppointmentStatus::Denied);
        assert_eq!(parsed.reason.as_deref(), Some("agenda cheia"));
        assert_eq!(parsed.appointment_at, None);
    }

    #[test]
    fn positional_denied_template_with_empty_reason_marker() {
        let body = format!("negado\nmotivo: (opcional)\ncaso: {CASE}");

        let parsed = parse_scheduler_reply(&body, case_id()).unwrap();

        assert_eq!(parsed.appointment_status, AppointmentStatus::Denied);
        assert_eq!(parsed.reason, None);
    }

    #[test]
    fn denied_section_header_is_normalized() {
        let body = format!("negado:\nmotivo: sem vaga\ncaso: {CASE}");

        let parsed = parse_scheduler_reply(&body, case_id()).unwrap();

        assert_eq!(parsed.appointment_status, AppointmentStatus::Denied);
        assert_eq!(parsed.reason.as_deref(), Some("sem vaga"));
    }

    #[test]
    fn case_line_with_surrounding_text_extracts_uuid() {
        let body = format!("negado\ncaso: o caso {CASE} foi recusado");

        let parsed = parse_scheduler_reply(&body, case_id()).unwrap();

        assert_eq!(parsed.case_id, case_id());
    }

    #[test]
    fn wrong_case_id_is_rejected() {
        let other = Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap();
        let body = format!("negado\ncaso: {CASE}");

        let err = parse_scheduler_reply(&body, other).unwrap_err();

        assert_eq!(err.reason(), "case_id_mismatch");
    }

    #[test]
    fn invalid_datetime_is_reported() {
        let body = format!("amanha de manha\nlocal: Sala 2\ninstrucoes: Jejum\ncaso: {CASE}");

        let err = parse_scheduler_reply(&body, case_id()).unwrap_err();

        assert_eq!(err.reason(), "invalid_confirmed_datetime");
    }

    #[test]
    fn missing_location_is_reported() {
        let body = format!("16-02-2026 14:30 BRT\ninstrucoes: Jejum\ncaso: {CASE}");

        let err = parse_scheduler_reply(&body, case_id()).unwrap_err();

        assert_eq!(err.reason(), "missing_location_line");
    }

    #[test]
    fn missing_case_line_is_reported() {
        let err = parse_scheduler_reply("negado\nmotivo: x", case_id()).unwrap_err();

        assert_eq!(err.reason(), "missing_case_line");
    }

    #[test]
    fn quoted_reply_lines_are_ignored() {
        let body = format!("> mensagem original\nnegado\ncaso: {CASE}");

        let parsed = parse_scheduler_reply(&body, case_id()).unwrap();

        assert_eq!(parsed.appointment_status, AppointmentStatus::Denied);
    }

    #[test]
    fn invalid_status_value_is_reported() {
        let body = format!("status: talvez\ncaso: {CASE}");

        let err = parse_scheduler_reply(&body, case_id()).unwrap_err();

        assert_eq!(err.reason(), "invalid_status_value");
    }
}
