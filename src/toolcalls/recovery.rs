//! Recover tool calls from a backend's `tool_use_failed` rejection.

use serde_json::Value;

use super::canonical::decode_arguments;
use super::coerce::truncate_chars;
use super::validate::validate_tool_calls;
use crate::error::Error;
use crate::types::chat::ChatResult;
use crate::types::tool::ToolCall;

/// Longest text kept when a failed generation is returned as plain text.
pub const MAX_FAILED_TEXT_CHARS: usize = 3000;

/// Parse the rejected generation attached to a `tool_use_failed` error.
///
/// Each entry with a string `name` and an object (or JSON-encoded object)
/// under `parameters`, `arguments` or `input` becomes a call. Legacy names are
/// kept as written.
pub fn parse_failed_generation(failed_generation: &str) -> Vec<ToolCall> {
    let entries = match serde_json::from_str::<Value>(failed_generation.trim()) {
        Ok(Value::Array(items)) => items,
        Ok(obj @ Value::Object(_)) => vec![obj],
        _ => return Vec::new(),
    };

    let calls = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let entry = entry.get("function").filter(|f| f.is_object()).unwrap_or(entry);
            let name = entry.get("name")?.as_str()?.trim();
            let raw = ["parameters", "arguments", "input"]
                .iter()
                .find_map(|k| entry.get(*k));
            let (arguments, parse_error) = decode_arguments(raw);
            if parse_error.is_some() {
                return None;
            }
            Some(ToolCall::new(format!("recovered_{}", index), name, arguments))
        })
        .collect();
    validate_tool_calls(calls)
}

/// Turn a `tool_use_failed` error into a result, or hand the error back.
///
/// Parsed calls become a result with empty text. With none, the generation
/// itself is returned as bounded text. With nothing to salvage the original
/// error is returned unchanged.
pub fn recover_tool_use_failed(err: Error) -> Result<ChatResult, Error> {
    let generation = match &err {
        Error::ToolUseFailed {
            failed_generation: Some(g),
            ..
        } if !g.trim().is_empty() => Some(g.clone()),
        _ => None,
    };
    let Some(generation) = generation else {
        return Err(err);
    };

    let tool_calls = parse_failed_generation(&generation);
    if !tool_calls.is_empty() {
        tracing::info!(count = tool_calls.len(), "recovered tool calls from rejected generation");
        return Ok(ChatResult {
            text: String::new(),
            tool_calls,
            ..Default::default()
        });
    }

    tracing::info!("returning rejected generation as text");
    Ok(ChatResult {
        text: truncate_chars(generation.trim(), MAX_FAILED_TEXT_CHARS),
        ..Default::default()
    })
}
