//! Robust decoding of JSON objects out of raw model text.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// No valid JSON object could be decoded from the model output.
#[derive(Debug, Error)]
#[error("no valid JSON object found in LLM response")]
pub struct LlmJsonParseError;

fn fenced_json_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)```(?:json)?\s*(\{[\s\S]*\})\s*```").expect("static regex")
    })
}

/// Decode the first valid JSON object from raw model text.
///
/// Strategy: direct decode, then a fenced ```json block, then the first
/// embedded `{...}` object found inside surrounding prose.
pub fn decode_llm_json_object(raw_response: &str) -> Result<Map<String, Value>, LlmJsonParseError> {
    if let Some(object) = decode_json_object(raw_response.trim()) {
        return Ok(object);
    }

    if let Some(captures) = fenced_json_pattern().captures(raw_response) {
        let fenced = captures.get(1).expect("capture").as_str().trim();
        if let Some(object) = decode_json_object(fenced) {
            return Ok(object);
        }
    }

    extract_first_embedded_json_object(raw_response).ok_or(LlmJsonParseError)
}

fn decode_json_object(text: &str) -> Option<Map<String, Value>> {
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn extract_first_embedded_json_object(raw_response: &str) -> Option<Map<String, Value>> {
    for (index, ch) in raw_response.char_indices() {
        if ch != '{' {
            continue;
        }
        let fragment = &raw_response[index..];
        let mut stream = serde_json::Deserializer::from_str(fragment).into_iter::<Value>();
        if let Some(Ok(Value::Object(object))) = stream.next() {
            return Some(object);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_object_decodes_directly() {
        let decoded = decode_llm_json_object(r#"  {"a": 1}  "#).unwrap();
        assert_eq!(decoded.get("a"), Some(&Value::from(1)));
    }

    #[test]
    fn fenced_block_is_unwrapped() {
        let decoded = decode_llm_json_object("```json\n{\"key\": \"value\"}\n```").unwrap();
        assert_eq!(decoded.get("key"), Some(&Value::from("value")));
    }

    #[test]
    fn embedded_object_in_prose_is_found() {
        let decoded =
            decode_llm_json_object("Segue o resultado: {\"ok\": true} conforme pedido").unwrap();
        assert_eq!(decoded.get("ok"), Some(&Value::from(true)));
    }

    #[test]
    fn top_level_array_is_rejected() {
        assert!(decode_llm_json_object("[1, 2, 3]").is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_llm_json_object("sem json aqui").is_err());
    }
}
