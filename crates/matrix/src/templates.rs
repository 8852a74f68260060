//! Message templates for the triage workflow posts.
//!
//! Human-facing bodies are pt-BR. Room-2 and Room-3 posts identify the case
//! by occurrence number and patient; the copy-paste templates are the only
//! messages that carry the case UUID, because the strict reply parsers key
//! on it.

use chrono::{DateTime, Utc};
use chrono_tz::America::Bahia;
use uuid::Uuid;

use triage_core::{Suggestion, SupportFlag};

const MAX_TEXT_PREVIEW_CHARS: usize = 1200;

fn record_or_fallback(agency_record_number: Option<&str>) -> &str {
    match agency_record_number {
        Some(value) if !value.trim().is_empty() => value,
        _ => "não detectado",
    }
}

fn patient_or_fallback(patient_name: Option<&str>) -> &str {
    match patient_name {
        Some(value) if !value.trim().is_empty() => value,
        _ => "não detectado",
    }
}

fn value_or_empty_marker(value: Option<&str>) -> &str {
    match value {
        Some(value) if !value.trim().is_empty() => value,
        _ => "(vazio)",
    }
}

fn identification_block(agency_record_number: Option<&str>, patient_name: Option<&str>) -> String {
    format!(
        "no. ocorrência: {}\npaciente: {}",
        record_or_fallback(agency_record_number),
        patient_or_fallback(patient_name),
    )
}

fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_PREVIEW_CHARS {
        return text.to_owned();
    }
    let preview: String = text.chars().take(MAX_TEXT_PREVIEW_CHARS).collect();
    format!("{preview}\n[...]")
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn suggestion_ptbr(suggestion: Option<Suggestion>) -> &'static str {
    match suggestion {
        Some(Suggestion::Accept) => "aceitar",
        Some(Suggestion::Deny) => "negar",
        None => "indefinida",
    }
}

fn support_ptbr(support: Option<SupportFlag>) -> &'static str {
    match support {
        Some(SupportFlag::None) => "nenhum",
        Some(SupportFlag::Anesthesist) => "anestesista",
        Some(SupportFlag::AnesthesistIcu) => "anestesista_uti",
        None => "desconhecido",
    }
}

fn format_brt(datetime: DateTime<Utc>) -> String {
    datetime.with_timezone(&Bahia).format("%d-%m-%Y %H:%M BRT").to_string()
}

// ── Room-2: triage review sequence ───────────────────────────────

/// Original-context message posted alongside the re-uploaded report PDF.
pub fn build_room2_case_pdf_message(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
    extracted_text: &str,
) -> String {
    format!(
        "Solicitação de triagem - contexto original\n{}\n\nPDF original do relatório segue anexado.\n\nTrecho extraído:\n{}",
        identification_block(agency_record_number, patient_name),
        truncate_preview(extracted_text),
    )
}

pub fn build_room2_case_pdf_formatted_html(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
    extracted_text: &str,
) -> String {
    format!(
        "<h1>Solicitação de triagem - contexto original</h1><p>no. ocorrência: {}</p><p>paciente: {}</p><p>PDF original do relatório segue anexado.</p><pre>{}</pre>",
        html_escape(record_or_fallback(agency_record_number)),
        html_escape(patient_or_fallback(patient_name)),
        html_escape(&truncate_preview(extracted_text)),
    )
}

/// Deterministic attachment filename for the re-uploaded report.
pub fn build_room2_case_pdf_attachment_filename(
    case_id: Uuid,
    agency_record_number: Option<&str>,
) -> String {
    let record = match agency_record_number {
        Some(value) if !value.trim().is_empty() => value.to_owned(),
        _ => "indisponivel".to_owned(),
    };
    format!("ocorrencia-{record}-caso-{case_id}-relatorio-original.pdf")
}

/// Compact technical summary; avoids dumping the raw structured JSON.
pub fn build_room2_case_summary_message(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
    summary_text: Option<&str>,
    suggestion: Option<Suggestion>,
    support: Option<SupportFlag>,
    short_reason: Option<&str>,
    critical_findings: &[String],
    critical_pending: &[String],
) -> String {
    let findings = if critical_findings.is_empty() {
        "- nenhum achado crítico registrado".to_owned()
    } else {
        critical_findings.iter().map(|item| format!("- {item}")).collect::<Vec<_>>().join("\n")
    };
    let pending = if critical_pending.is_empty() {
        "- nenhuma pendência crítica registrada".to_owned()
    } else {
        critical_pending.iter().map(|item| format!("- {item}")).collect::<Vec<_>>().join("\n")
    };

    format!(
        "# Resumo técnico da triagem\n{}\n\n## Resumo clínico:\n{}\n\n## Achados críticos:\n{}\n\n## Pendências críticas:\n{}\n\n## Decisão sugerida:\n{}\n\n## Suporte recomendado:\n{}\n\n## Motivo objetivo:\n{}\n\n## Conduta sugerida:\nConsulte o relatório original para dados estruturados completos.\nResumo detalhado disponível no histórico técnico do caso.",
        identification_block(agency_record_number, patient_name),
        summary_text.unwrap_or("resumo indisponível"),
        findings,
        pending,
        suggestion_ptbr(suggestion),
        support_ptbr(support),
        short_reason.unwrap_or("não informado"),
    )
}

/// Step-by-step reply instructions preceding the copy-paste template.
pub fn build_room2_case_decision_instructions_message(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
) -> String {
    format!(
        "Instrução de decisão médica\n{}\n\n1. Copie a PRÓXIMA mensagem (modelo de decisão).\n2. Edite os campos e responda como resposta a ela.\n3. Valores válidos: decisão:aceitar | decisão:negar; suporte: nenhum | anestesista | anestesista_uti.\n4. Com decisão:negar o suporte deve ser nenhum.",
        identification_block(agency_record_number, patient_name),
    )
}

pub fn build_room2_case_decision_instructions_formatted_html(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
) -> String {
    format!(
        "<h1>Instrução de decisão médica</h1><p>no. ocorrência: {}<br>paciente: {}</p><ol><li>Copie a <strong>PRÓXIMA mensagem</strong> (modelo de decisão).</li><li>Edite os campos e responda como resposta a ela.</li><li>Valores válidos: decisão:aceitar | decisão:negar; suporte: nenhum | anestesista | anestesista_uti.</li><li>Com decisão:negar o suporte deve ser nenhum.</li></ol>",
        html_escape(record_or_fallback(agency_record_number)),
        html_escape(patient_or_fallback(patient_name)),
    )
}

/// Copy-paste-ready decision template; carries the case UUID.
pub fn build_room2_case_decision_template_message(case_id: Uuid) -> String {
    format!("decisao: aceitar\nsuporte: nenhum\nmotivo: (opcional)\ncaso: {case_id}")
}

pub fn build_room2_case_decision_template_formatted_html(case_id: Uuid) -> String {
    format!("<p>decisao: aceitar<br>suporte: nenhum<br>motivo: (opcional)<br>caso: {case_id}</p>")
}

/// Acknowledgement after a decision is applied.
pub fn build_room2_decision_ack_message(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
    decision_ptbr: &str,
) -> String {
    format!(
        "Decisão registrada: {decision_ptbr}\n{}",
        identification_block(agency_record_number, patient_name),
    )
}

/// Feedback for an unparseable or non-applicable decision reply.
pub fn build_room2_decision_error_message(reason: &str) -> String {
    format!(
        "Não foi possível registrar a decisão ({reason}).\nCopie o modelo de decisão, edite os campos e responda novamente como resposta ao modelo."
    )
}

// ── Room-3: scheduling ───────────────────────────────────────────

pub fn build_room3_request_message(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
    patient_age: Option<&str>,
    requested_exam: Option<&str>,
) -> String {
    format!(
        "Solicitação de agendamento\n{}\nidade: {}\nexame solicitado: {}\n\nResponda à PRÓXIMA mensagem usando um dos formatos estritos.",
        identification_block(agency_record_number, patient_name),
        value_or_empty_marker(patient_age),
        value_or_empty_marker(requested_exam),
    )
}

/// Strict reply template; carries the case UUID.
pub fn build_room3_reply_template_message(
    case_id: Uuid,
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
) -> String {
    format!(
        "{}\n\nCONFIRMADO:\nDD-MM-YYYY HH:MM BRT\nlocal: ...\ninstrucoes: ...\ncaso: {case_id}\n\nNEGADO:\nnegado\nmotivo: ...\ncaso: {case_id}",
        identification_block(agency_record_number, patient_name),
    )
}

pub fn build_room3_ack_message(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
    patient_age: Option<&str>,
    requested_exam: Option<&str>,
) -> String {
    format!(
        "Resposta de agendamento registrada.\n{}\nidade: {}\nexame solicitado: {}",
        identification_block(agency_record_number, patient_name),
        value_or_empty_marker(patient_age),
        value_or_empty_marker(requested_exam),
    )
}

/// Strict reformat prompt for invalid scheduler replies.
pub fn build_room3_invalid_format_reprompt(
    case_id: Uuid,
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
) -> String {
    format!(
        "Não consegui interpretar a resposta para este caso.\n{}\n\nResponda usando UM dos formatos abaixo (um campo por linha) e inclua a linha do caso.\n\nCONFIRMADO:\nDD-MM-YYYY HH:MM BRT\nlocal: ...\ninstrucoes: ...\ncaso: {case_id}\n\nNEGADO:\nnegado\nmotivo: ...\ncaso: {case_id}",
        identification_block(agency_record_number, patient_name),
    )
}

// ── Room-1: final replies ────────────────────────────────────────

pub fn build_room1_final_accepted_message(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
    patient_age: Option<&str>,
    requested_exam: Option<&str>,
    appointment_at: DateTime<Utc>,
    location: &str,
    instructions: &str,
) -> String {
    format!(
        "Agendamento confirmado\n{}\nidade: {}\nexame solicitado: {}\n\ndata/hora: {}\nlocal: {location}\ninstruções: {instructions}",
        identification_block(agency_record_number, patient_name),
        value_or_empty_marker(patient_age),
        value_or_empty_marker(requested_exam),
        format_brt(appointment_at),
    )
}

pub fn build_room1_final_appt_denied_message(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
    patient_age: Option<&str>,
    requested_exam: Option<&str>,
    reason: Option<&str>,
) -> String {
    format!(
        "Agendamento negado\n{}\nidade: {}\nexame solicitado: {}\nmotivo: {}",
        identification_block(agency_record_number, patient_name),
        value_or_empty_marker(patient_age),
        value_or_empty_marker(requested_exam),
        value_or_empty_marker(reason),
    )
}

pub fn build_room1_final_denial_triage_message(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
    patient_age: Option<&str>,
    requested_exam: Option<&str>,
    reason: Option<&str>,
) -> String {
    format!(
        "Solicitação negada na triagem médica\n{}\nidade: {}\nexame solicitado: {}\nmotivo: {}",
        identification_block(agency_record_number, patient_name),
        value_or_empty_marker(patient_age),
        value_or_empty_marker(requested_exam),
        value_or_empty_marker(reason),
    )
}

pub fn build_room1_final_failure_message(
    agency_record_number: Option<&str>,
    patient_name: Option<&str>,
    patient_age: Option<&str>,
    requested_exam: Option<&str>,
    cause: &str,
    details: &str,
) -> String {
    format!(
        "Falha no processamento da solicitação\n{}\nidade: {}\nexame solicitado: {}\n\ncausa: {cause}\ndetalhes: {details}",
        identification_block(agency_record_number, patient_name),
        value_or_empty_marker(patient_age),
        value_or_empty_marker(requested_exam),
    )
}

// ── Room-4: supervisor summary ───────────────────────────────────

pub struct Room4SummaryCounts {
    pub cases_created: i64,
    pub doctor_accepted: i64,
    pub doctor_denied: i64,
    pub appt_confirmed: i64,
    pub appt_denied: i64,
    pub failed: i64,
    pub cleaned: i64,
}

pub fn build_room4_summary_message(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    timezone_name: &str,
    counts: &Room4SummaryCounts,
) -> String {
    format!(
        "Resumo do período ({} a {}, {timezone_name})\n\nnovos casos: {}\naceitos na triagem: {}\nnegados na triagem: {}\nagendamentos confirmados: {}\nagendamentos negados: {}\nfalhas: {}\nhigienizados: {}",
        format_brt(window_start),
        format_brt(window_end),
        counts.cases_created,
        counts.doctor_accepted,
        counts.doctor_denied,
        counts.appt_confirmed,
        counts.appt_denied,
        counts.failed,
        counts.cleaned,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case_id() -> Uuid {
        Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap()
    }

    #[test]
    fn room2_pdf_message_identifies_case_without_uuid() {
        let body =
            build_room2_case_pdf_message(Some("12345"), Some("MARIA"), "Paciente com dispepsia.");

        assert!(body.contains("no. ocorrência: 12345"));
        assert!(body.contains("paciente: MARIA"));
        assert!(body.contains("PDF original do relatório"));
        assert!(!body.contains(&case_id().to_string()));
    }

    #[test]
    fn room2_pdf_html_has_heading_and_context() {
        let body = build_room2_case_pdf_formatted_html(Some("12345"), Some("MARIA"), "Linha 1");

        assert!(body.contains("<h1>Solicitação de triagem - contexto original</h1>"));
        assert!(body.contains("<p>no. ocorrência: 12345</p>"));
        assert!(body.contains("<p>paciente: MARIA</p>"));
    }

    #[test]
    fn pdf_attachment_filename_is_deterministic() {
        let filename = build_room2_case_pdf_attachment_filename(case_id(), Some("4777300"));
        assert_eq!(
            filename,
            "ocorrencia-4777300-caso-11111111-1111-1111-1111-111111111111-relatorio-original.pdf"
        );

        let fallback = build_room2_case_pdf_attachment_filename(case_id(), Some(" "));
        assert_eq!(
            fallback,
            "ocorrencia-indisponivel-caso-11111111-1111-1111-1111-111111111111-relatorio-original.pdf"
        );
    }

    #[test]
    fn room2_summary_sections_appear_in_order_without_json_dump() {
        let body = build_room2_case_summary_message(
            Some("12345"),
            Some("PACIENTE"),
            Some("Resumo LLM1"),
            Some(Suggestion::Accept),
            Some(SupportFlag::None),
            Some("criterios atendidos"),
            &["hb baixa".to_owned()],
            &[],
        );

        let sections = [
            "## Resumo clínico:",
            "## Achados críticos:",
            "## Pendências críticas:",
            "## Decisão sugerida:",
            "## Suporte recomendado:",
            "## Motivo objetivo:",
            "## Conduta sugerida:",
        ];
        let positions: Vec<usize> = sections.iter().map(|s| body.find(s).unwrap()).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);

        assert!(body.contains("Resumo LLM1"));
        assert!(body.contains("aceitar"));
        assert!(!body.contains("accept"));
        assert!(!body.contains("```json"));
        assert!(body.contains("Consulte o relatório original para dados estruturados completos."));
    }

    #[test]
    fn room2_instructions_explain_copy_and_reply_flow() {
        let body = build_room2_case_decision_instructions_message(Some("12345"), Some("PACIENTE"));

        assert!(body.to_lowercase().contains("copie a próxima mensagem"));
        assert!(body.to_lowercase().contains("responda como resposta a ela"));
        assert!(body.contains("decisão:aceitar"));
        assert!(body.to_lowercase().contains("valores válidos"));
    }

    #[test]
    fn room2_decision_template_is_copy_paste_ready() {
        let body = build_room2_case_decision_template_message(case_id());

        assert!(body.starts_with("decisao: aceitar\n"));
        assert!(body.contains("suporte: nenhum\n"));
        assert!(body.contains("motivo: (opcional)\n"));
        assert!(body.ends_with(&format!("caso: {}", case_id())));
    }

    #[test]
    fn room3_request_identifies_patient_without_uuid() {
        let body =
            build_room3_request_message(Some("4777300"), Some("MARIA"), Some("42"), Some("EDA"));

        assert!(body.contains("no. ocorrência: 4777300"));
        assert!(body.contains("paciente: MARIA"));
        assert!(body.contains("idade: 42"));
        assert!(body.contains("exame solicitado: EDA"));
        assert!(!body.contains(&case_id().to_string()));
    }

    #[test]
    fn room3_reply_template_keeps_uuid() {
        let body = build_room3_reply_template_message(case_id(), Some("12345"), Some("JOSE"));

        assert!(body.contains("no. ocorrência: 12345"));
        assert!(body.contains("paciente: JOSE"));
        assert!(body.contains(&format!("caso: {}", case_id())));
    }

    #[test]
    fn room3_reprompt_uses_fallback_identification() {
        let body = build_room3_invalid_format_reprompt(case_id(), None, Some(""));

        assert!(body.contains("no. ocorrência: não detectado"));
        assert!(body.contains("paciente: não detectado"));
        assert!(body.contains(&format!("caso: {}", case_id())));
    }

    #[test]
    fn room1_accepted_message_formats_brt_datetime() {
        let appointment_at = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 2, 16, 17, 30, 0).unwrap();
        let body = build_room1_final_accepted_message(
            Some("777002"),
            Some("PACIENTE APTO"),
            Some("62"),
            Some("EDA"),
            appointment_at,
            "Sala 2",
            "Jejum 8h",
        );

        assert!(body.contains("no. ocorrência: 777002"));
        assert!(body.contains("paciente: PACIENTE APTO"));
        assert!(body.contains("data/hora: 16-02-2026 14:30 BRT"));
        assert!(body.contains("local: Sala 2"));
        assert!(!body.contains(&case_id().to_string()));
    }

    #[test]
    fn room1_failure_message_uses_fallbacks() {
        let body = build_room1_final_failure_message(None, None, None, None, "llm1", "schema mismatch");

        assert!(body.contains("no. ocorrência: não detectado"));
        assert!(body.contains("paciente: não detectado"));
        assert!(body.contains("idade: (vazio)"));
        assert!(body.contains("exame solicitado: (vazio)"));
        assert!(body.contains("causa: llm1"));
        assert!(body.contains("detalhes: schema mismatch"));
    }

    #[test]
    fn room4_summary_reports_window_counts() {
        let window_end = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 2, 16, 22, 0, 0).unwrap();
        let window_start = window_end - chrono::Duration::hours(12);
        let body = build_room4_summary_message(
            window_start,
            window_end,
            "America/Bahia",
            &Room4SummaryCounts {
                cases_created: 4,
                doctor_accepted: 2,
                doctor_denied: 1,
                appt_confirmed: 2,
                appt_denied: 0,
                failed: 1,
                cleaned: 3,
            },
        );

        assert!(body.contains("novos casos: 4"));
        assert!(body.contains("aceitos na triagem: 2"));
        assert!(body.contains("higienizados: 3"));
        assert!(body.contains("America/Bahia"));
    }
}
