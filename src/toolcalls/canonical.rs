use serde_json::{Map, Value};

use crate::types::tool::ToolCall;

/// Parse the structured tool-call field of a backend message into normalized calls.
///
/// Accepts OpenAI `tool_calls[].function`, flat `{name, arguments}` entries used by
/// local servers, and the legacy single `function_call` field. A call whose
/// arguments cannot be decoded is still emitted, with empty arguments and
/// `parse_error` set, so a later pass can repair it.
pub fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
    let mut calls = Vec::new();

    if let Some(entries) = message.get("tool_calls").and_then(Value::as_array) {
        for (index, entry) in entries.iter().enumerate() {
            if let Some(call) = parse_entry(entry, index) {
                calls.push(call);
            }
        }
    }

    if calls.is_empty() {
        if let Some(fc) = message.get("function_call").filter(|v| v.is_object()) {
            if let Some(call) = parse_entry(fc, 0) {
                calls.push(call);
            }
        }
    }

    calls
}

fn parse_entry(entry: &Value, index: usize) -> Option<ToolCall> {
    if !entry.is_object() {
        return None;
    }
    let function = entry.get("function").filter(|f| f.is_object()).unwrap_or(entry);

    let name = function
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let raw_args = function
        .get("arguments")
        .or_else(|| function.get("parameters"))
        .or_else(|| function.get("input"));

    if name.is_empty() && raw_args.is_none() {
        return None;
    }

    let id = entry
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("call_{}", index));

    let (arguments, parse_error) = decode_arguments(raw_args);
    Some(ToolCall {
        id,
        name,
        arguments,
        parse_error,
    })
}

/// Decode an arguments payload that may be an object or a JSON-encoded string.
pub fn decode_arguments(raw: Option<&Value>) -> (Map<String, Value>, Option<String>) {
    match raw {
        None | Some(Value::Null) => (Map::new(), None),
        Some(Value::Object(map)) => (map.clone(), None),
        Some(Value::String(s)) => decode_argument_string(s, true),
        Some(other) => (
            Map::new(),
            Some(format!("arguments must be an object, got {}", json_type(other))),
        ),
    }
}

fn decode_argument_string(s: &str, allow_nested: bool) -> (Map<String, Value>, Option<String>) {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return (Map::new(), None);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => (map, None),
        // Some proxies double-encode the arguments string.
        Ok(Value::String(inner)) if allow_nested => decode_argument_string(&inner, false),
        Ok(other) => (
            Map::new(),
            Some(format!(
                "arguments decoded to {}, expected an object",
                json_type(&other)
            )),
        ),
        Err(e) => (Map::new(), Some(format!("invalid JSON arguments: {}", e))),
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
