//! Agency record-number extraction and watermark stripping.
//!
//! Clinical report PDFs carry the agency registration code either behind an
//! explicit `Código:` label or inside the occurrence-report header flow, and
//! repeat it as a visual watermark across the page. The pipeline needs the
//! code once, and the LLM stages need text without the watermark noise.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;

/// Extracted record number plus the cleaned report text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordNumberExtraction {
    pub record_number: String,
    pub cleaned_text: String,
}

fn code_label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\bC(?:o|ó|Ó)digo\s*:\s*([0-9]{5,})\b").expect("static regex")
    })
}

fn report_header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?is)RELAT(?:O|Ó)RIO\s+DE\s+OCORR(?:E|Ê)NCIAS(?:\s*[:\-])?[\s\S]{0,120}?\b([0-9]{5,})\b",
        )
        .expect("static regex")
    })
}

fn watermark_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // A line made of one 5+ digit token repeated four or more times.
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([0-9]{5,})(?:\s+([0-9]{5,})){3,}\s*$").expect("static regex")
    })
}

/// All explicit registration-code occurrences in document order.
pub fn extract_registration_codes(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    for pattern in [code_label_pattern(), report_header_pattern()] {
        for captures in pattern.captures_iter(text) {
            let group = captures.get(1).expect("pattern has one capture group");
            if found.iter().any(|(start, code)| *start == group.start() && code == group.as_str()) {
                continue;
            }
            found.push((group.start(), group.as_str().to_owned()));
        }
    }
    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, code)| code).collect()
}

/// Extract the agency record number and strip its occurrences from the text.
///
/// Explicit registration patterns win, first occurrence in document order;
/// without one the current epoch in milliseconds stands in as a placeholder.
/// Watermark lines (the same 5+ digit token repeated four or more times) are
/// dropped along with later isolated repeats of that token, then whitespace
/// is normalized preserving paragraph breaks.
pub fn extract_and_strip_record_number(text: &str) -> RecordNumberExtraction {
    let explicit = extract_registration_codes(text);
    let selected = explicit
        .first()
        .cloned()
        .unwrap_or_else(|| current_epoch_millis().to_string());

    let without_watermark = strip_watermark_lines(text);
    let token_pattern =
        Regex::new(&format!(r"\b{}\b", regex::escape(&selected))).expect("escaped token regex");
    let stripped = token_pattern.replace_all(&without_watermark, " ");
    let cleaned_text = normalize_preserving_linebreaks(&stripped);

    RecordNumberExtraction { record_number: selected, cleaned_text }
}

fn current_epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

/// Drop watermark lines and later isolated residuals of their token.
fn strip_watermark_lines(text: &str) -> String {
    let mut watermark_token: Option<String> = None;
    let mut kept: Vec<&str> = Vec::new();

    for line in text.lines() {
        if let Some(captures) = watermark_line_pattern().captures(line) {
            let token = captures.get(1).expect("capture").as_str();
            let all_same = line.split_whitespace().all(|part| part == token);
            if all_same {
                watermark_token = Some(token.to_owned());
                continue;
            }
        }
        if let Some(token) = &watermark_token {
            let trimmed = line.trim();
            if trimmed == token {
                continue;
            }
        }
        kept.push(line);
    }

    kept.join("\n")
}

fn normalize_preserving_linebreaks(text: &str) -> String {
    let mut normalized: Vec<String> = Vec::new();
    for raw_line in text.lines() {
        let compact = raw_line.split_whitespace().collect::<Vec<_>>().join(" ");
        if compact.is_empty() {
            if normalized.last().is_some_and(|last| !last.is_empty()) {
                normalized.push(String::new());
            }
            continue;
        }
        normalized.push(compact);
    }
    while normalized.last().is_some_and(String::is_empty) {
        normalized.pop();
    }
    normalized.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_code_is_extracted_with_and_without_accent() {
        let codes = extract_registration_codes("Codigo: 1234567\nCÓDIGO: 765432198");
        assert_eq!(codes, vec!["1234567", "765432198"]);
    }

    #[test]
    fn short_tokens_are_ignored() {
        let codes =
            extract_registration_codes("Codigo: 1234\nCodigo: 12345\nCodigo: 123456789");
        assert_eq!(codes, vec!["12345", "123456789"]);
    }

    #[test]
    fn report_header_flow_allows_lookahead() {
        let codes = extract_registration_codes("RELATÓRIO DE OCORRÊNCIAS\n123456789\nobservação");
        assert_eq!(codes, vec!["123456789"]);

        let codes = extract_registration_codes("RELATORIO DE OCORRENCIAS:\nregistro 7654321\nfim");
        assert_eq!(codes, vec!["7654321"]);
    }

    #[test]
    fn first_occurrence_in_document_order_wins() {
        let text = "RELATORIO DE OCORRENCIAS\n99999111\ncorpo\nCodigo: 4777300";

        let result = extract_and_strip_record_number(text);

        assert_eq!(result.record_number, "99999111");
    }

    #[test]
    fn all_occurrences_of_selected_token_are_stripped() {
        let text = "Codigo: 4777300\nlaudo 4777300 texto\nrodape 4777300";

        let result = extract_and_strip_record_number(text);

        assert_eq!(result.record_number, "4777300");
        assert!(!result.cleaned_text.contains("4777300"));
        assert!(result.cleaned_text.contains("laudo texto"));
    }

    #[test]
    fn watermark_lines_and_residuals_are_removed() {
        let text = "Codigo: 55555\ncabecalho\n88221 88221 88221 88221 88221\ncorpo do laudo\n88221\nconclusao";

        let result = extract_and_strip_record_number(text);

        assert!(!result.cleaned_text.contains("88221"));
        assert!(result.cleaned_text.contains("corpo do laudo"));
        assert!(result.cleaned_text.contains("conclusao"));
    }

    #[test]
    fn missing_pattern_falls_back_to_epoch_placeholder() {
        let result = extract_and_strip_record_number("laudo sem codigo");

        assert!(result.record_number.len() >= 12);
        assert!(result.record_number.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(result.cleaned_text, "laudo sem codigo");
    }

    #[test]
    fn extraction_is_stable_for_same_text() {
        let text = "Codigo: 12345\nlinha  com   espacos\n\n\nfinal";

        let first = extract_and_strip_record_number(text);
        let second = extract_and_strip_record_number(text);

        assert_eq!(first, second);
        assert_eq!(first.cleaned_text, "linha com espacos\n\nfinal");
    }
}
