//! Detection of `CALL_TOOL {...}` requests embedded in model text.
//!
//! This is the single parser used both by the main loop and by the router.

use crate::core::error::ToolError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Deserializer, Map, Value};
use std::sync::LazyLock;

pub const SENTINEL: &str = "CALL_TOOL";

// `\b` keeps `CALL_TOOL_ANSWER` (underscore is a word character) from matching.
static SENTINEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bCALL_TOOL\b").expect("valid sentinel regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Canonical single-line form, `CALL_TOOL {"name": ..., "arguments": {...}}`.
    pub fn to_wire(&self) -> String {
        let payload = serde_json::json!({
            "name": self.name,
            "arguments": self.arguments,
        });
        format!("{} {}", SENTINEL, payload)
    }
}

/// Byte offset of the first sentinel in `text`.
pub fn find_sentinel(text: &str) -> Option<usize> {
    SENTINEL_RE.find(text).map(|m| m.start())
}

/// Text the model produced before its tool call, trimmed.
pub fn preamble(text: &str) -> &str {
    match find_sentinel(text) {
        Some(pos) => text[..pos].trim(),
        None => text.trim(),
    }
}

/// Returns the first tool call in `text`, `None` when there is no sentinel.
///
/// Only the first sentinel is honored and the JSON object after it ends at its
/// own closing brace; anything that follows is ignored. A sentinel followed
/// by something other than a well-formed call is an error, never "no call".
pub fn extract_call(text: &str) -> Result<Option<ToolCallRequest>, ToolError> {
    let Some(found) = SENTINEL_RE.find(text) else {
        return Ok(None);
    };

    let body = text[found.end()..].trim_start();
    if !body.starts_with('{') {
        return Err(ToolError::Parse(format!(
            "expected a JSON object after {}",
            SENTINEL
        )));
    }

    let value = Deserializer::from_str(body)
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| ToolError::Parse("empty tool call payload".to_string()))?
        .map_err(|e| ToolError::Parse(format!("invalid JSON: {}", e)))?;

    let Value::Object(mut object) = value else {
        return Err(ToolError::Parse("payload is not an object".to_string()));
    };

    let name = match object.remove("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(Value::String(_)) => return Err(ToolError::Parse("empty tool name".to_string())),
        Some(_) => return Err(ToolError::Parse("\"name\" must be a string".to_string())),
        None => return Err(ToolError::Parse("missing \"name\"".to_string())),
    };

    let arguments = match object.remove("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(arguments)) => arguments,
        Some(_) => {
            return Err(ToolError::Parse(
                "\"arguments\" must be an object".to_string(),
            ));
        }
    };

    Ok(Some(ToolCallRequest { name, arguments }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_text_has_no_call() {
        for text in [
            "",
            "The weather in Paris is sunny.",
            "call_tool lowercase is not the sentinel",
            "CALL_TOOL_ANSWER tool result for Math.sum_numbers: 5",
            "{\"name\": \"Math.sum_numbers\"}",
        ] {
            assert_eq!(extract_call(text), Ok(None), "{text}");
            assert_eq!(extract_call(text), extract_call(text));
        }
    }

    #[test]
    fn recovers_name_and_arguments_exactly() {
        let text = r#"CALL_TOOL {"name": "Math.sum_numbers", "arguments": {"a": 2, "b": 3}}"#;
        let call = extract_call(text).unwrap().unwrap();
        assert_eq!(call.name, "Math.sum_numbers");
        assert_eq!(call.arguments, json!({"a": 2, "b": 3}).as_object().cloned().unwrap());
    }

    #[test]
    fn surrounding_text_is_ignored() {
        let text = "Let me check.\nCALL_TOOL {\"name\": \"Weather.get_weather\", \"arguments\": {\"city\": \"Paris\"}} and then I'll answer";
        let call = extract_call(text).unwrap().unwrap();
        assert_eq!(call.name, "Weather.get_weather");
        assert_eq!(call.arguments["city"], "Paris");
        assert_eq!(preamble(text), "Let me check.");
    }

    #[test]
    fn only_first_call_is_honored() {
        let text = r#"CALL_TOOL {"name": "A.first"} CALL_TOOL {"name": "B.second"}"#;
        assert_eq!(extract_call(text).unwrap().unwrap().name, "A.first");
    }

    #[test]
    fn arguments_default_to_empty() {
        let call = extract_call(r#"CALL_TOOL {"name": "Time.current_time"}"#)
            .unwrap()
            .unwrap();
        assert!(call.arguments.is_empty());
        let call = extract_call(r#"CALL_TOOL {"name": "Time.current_time", "arguments": null}"#)
            .unwrap()
            .unwrap();
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn malformed_payloads_are_errors() {
        for text in [
            "CALL_TOOL",
            "CALL_TOOL please",
            r#"CALL_TOOL {"name": "Math.sum_numbers", "arguments": {"a": 2"#,
            r#"CALL_TOOL {"arguments": {}}"#,
            r#"CALL_TOOL {"name": 7}"#,
            r#"CALL_TOOL {"name": "  "}"#,
            r#"CALL_TOOL {"name": "A.b", "arguments": [1, 2]}"#,
        ] {
            assert!(
                matches!(extract_call(text), Err(ToolError::Parse(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn wire_form_round_trips() {
        let call = ToolCallRequest::new(
            "Weather.get_weather",
            json!({"city": "London"}).as_object().cloned().unwrap(),
        );
        let wire = call.to_wire();
        assert!(wire.starts_with("CALL_TOOL {"));
        assert!(!wire.contains('\n'));
        assert_eq!(extract_call(&wire).unwrap(), Some(call));
    }

    #[test]
    fn finds_sentinel_offset() {
        assert_eq!(find_sentinel("ok CALL_TOOL {}"), Some(3));
        assert_eq!(find_sentinel("CALL_TOOL_ANSWER x"), None);
    }
}
