//! Wire types for the chat-completions endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

#[derive(Serialize, Clone)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// `json_object` mode or `json_schema` strict mode.
#[derive(Serialize, Clone)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<JsonSchemaFormat>,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self { format_type: "json_object".to_owned(), json_schema: None }
    }

    /// Strict schema mode: every property becomes required, recursively.
    pub fn json_schema_strict(name: &str, mut schema: Value) -> Self {
        enforce_strict_required(&mut schema);
        Self {
            format_type: "json_schema".to_owned(),
            json_schema: Some(JsonSchemaFormat {
                name: name.to_owned(),
                strict: true,
                schema,
            }),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub strict: bool,
    pub schema: Value,
}

#[derive(Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Deserialize)]
pub struct ResponseMessage {
    pub content: String,
}

/// Add every key under `properties` to `required`, recursively, as the
/// provider's strict mode demands.
pub fn enforce_strict_required(schema: &mut Value) {
    let Some(object) = schema.as_object_mut() else {
        return;
    };

    let required: Option<Vec<Value>> = object
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| properties.keys().map(|key| Value::from(key.as_str())).collect());
    if let Some(required) = required {
        object.insert("required".to_owned(), Value::Array(required));
    }

    for (key, value) in object.iter_mut() {
        match key.as_str() {
            "properties" => {
                if let Some(properties) = value.as_object_mut() {
                    for property in properties.values_mut() {
                        enforce_strict_required(property);
                    }
                }
            }
            "items" => enforce_strict_required(value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_mode_requires_every_property_recursively() {
        let mut schema = json!({
            "type": "object",
            "properties": {
                "a": {"type": "string"},
                "b": {
                    "type": "object",
                    "properties": {"c": {"type": "number"}}
                },
                "d": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"e": {"type": "boolean"}}
                    }
                }
            }
        });

        enforce_strict_required(&mut schema);

        assert_eq!(schema["required"], json!(["a", "b", "d"]));
        assert_eq!(schema["properties"]["b"]["required"], json!(["c"]));
        assert_eq!(schema["properties"]["d"]["items"]["required"], json!(["e"]));
    }

    #[test]
    fn response_format_serializes_expected_shape() {
        let format = ResponseFormat::json_object();
        let serialized = serde_json::to_value(&format).unwrap();
        assert_eq!(serialized, json!({"type": "json_object"}));
    }
}
