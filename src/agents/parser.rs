//! Extraction of tool calls from free-form model replies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool call extracted from a model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    pub arguments: Value,
}

/// Trait for parsing tool calls from model replies.
pub trait ToolCallParser: Send + Sync {
    /// First tool call in `response`, if any.
    fn parse(&self, response: &str) -> Option<ToolCall>;
}

/// Parser for JSON tool calls.
///
/// Accepted shapes, in order of preference:
/// - a ```json fenced block holding `{"tool": .., "arguments": ..}`
/// - a bare JSON object anywhere in the text with `tool`/`arguments`
/// - the `{"name": .., "parameters": ..}` variant (also `args`/`arguments`)
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonToolCallParser;

impl ToolCallParser for JsonToolCallParser {
    fn parse(&self, response: &str) -> Option<ToolCall> {
        self.parse_code_block_format(response)
            .or_else(|| self.parse_json_format(response))
    }
}

impl JsonToolCallParser {
    /// Tool call described by a parsed JSON object.
    fn from_value(value: &Value) -> Option<ToolCall> {
        let empty = || Value::Object(Map::new());

        if let Some(name) = value.get("tool").and_then(Value::as_str) {
            return Some(ToolCall {
                name: name.to_string(),
                arguments: value.get("arguments").cloned().unwrap_or_else(empty),
            });
        }

        // `name` alone is too common in ordinary JSON answers; require an argument key.
        let name = value.get("name").and_then(Value::as_str)?;
        let arguments = value
            .get("parameters")
            .or_else(|| value.get("args"))
            .or_else(|| value.get("arguments"))?
            .clone();
        Some(ToolCall {
            name: name.to_string(),
            arguments: normalize_arguments(arguments),
        })
    }

    /// Tool calls inside ```json fenced blocks.
    fn parse_code_block_format(&self, response: &str) -> Option<ToolCall> {
        const BLOCK_START: &str = "```json";
        const BLOCK_END: &str = "```";

        let mut rest = response;
        while let Some(start) = rest.find(BLOCK_START) {
            let content = &rest[start + BLOCK_START.len()..];
            let end = content.find(BLOCK_END)?;
            if let Ok(value) = serde_json::from_str::<Value>(content[..end].trim()) {
                if let Some(call) = Self::from_value(&value) {
                    return Some(call);
                }
            }
            rest = &content[end + BLOCK_END.len()..];
        }
        None
    }

    /// Top-level JSON objects anywhere in the text.
    fn parse_json_format(&self, response: &str) -> Option<ToolCall> {
        let mut depth = 0usize;
        let mut start = None;
        let mut in_string = false;
        let mut escaped = false;

        for (i, c) in response.char_indices() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' if depth > 0 => in_string = true,
                '{' => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                '}' if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            if let Ok(value) = serde_json::from_str::<Value>(&response[s..=i]) {
                                if let Some(call) = Self::from_value(&value) {
                                    return Some(call);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// Arguments given as a JSON-encoded string are decoded into an object.
fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_json_format() {
        let response =
            r#"I will run this: {"tool": "execute_code", "arguments": {"code": "print(1)"}}"#;
        let call = JsonToolCallParser.parse(response).expect("call");
        assert_eq!(call.name, "execute_code");
        assert_eq!(call.arguments["code"], "print(1)");
    }

    #[test]
    fn test_name_parameters_format() {
        let response = r#"Using tool: {"name": "search_wiki", "parameters": {"entity": "Rust"}}"#;
        let call = JsonToolCallParser.parse(response).expect("call");
        assert_eq!(call.name, "search_wiki");
        assert_eq!(call.arguments["entity"], "Rust");
    }

    #[test]
    fn test_string_encoded_arguments() {
        let response = r#"{"name": "web_search", "arguments": "{\"question\": \"q\"}"}"#;
        let call = JsonToolCallParser.parse(response).expect("call");
        assert_eq!(call.arguments["question"], "q");
    }

    #[test]
    fn test_code_block_format() {
        let response = r#"
Let me look it up:

```json
{"tool": "search_wiki", "arguments": {"entity": "Mercedes Sosa"}}
```
"#;
        let call = JsonToolCallParser.parse(response).expect("call");
        assert_eq!(call.name, "search_wiki");
        assert_eq!(call.arguments["entity"], "Mercedes Sosa");
    }

    #[test]
    fn test_braces_inside_strings() {
        let response = r#"{"tool": "execute_code", "arguments": {"code": "d = {'a': 1}\nprint(d['a'] }"}}"#;
        let call = JsonToolCallParser.parse(response).expect("call");
        assert_eq!(call.name, "execute_code");
        assert!(call.arguments["code"].as_str().unwrap_or("").contains("{'a': 1}"));
    }

    #[test]
    fn test_skips_non_tool_json() {
        let response = r#"The data is {"count": 3}. Now: {"tool": "x", "arguments": {}}"#;
        let call = JsonToolCallParser.parse(response).expect("call");
        assert_eq!(call.name, "x");
    }

    #[test]
    fn test_plain_json_answer_is_not_a_call() {
        assert!(JsonToolCallParser.parse(r#"{"name": "Paris"}"#).is_none());
    }

    #[test]
    fn test_no_tool_call() {
        let response = "I'll analyze the situation first before taking action.";
        assert!(JsonToolCallParser.parse(response).is_none());
    }

    #[test]
    fn test_missing_arguments_default_to_empty_object() {
        let call = JsonToolCallParser.parse(r#"{"tool": "noop"}"#).expect("call");
        assert_eq!(call.arguments, serde_json::json!({}));
    }
}
