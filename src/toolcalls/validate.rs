use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::tool::ToolCall;

static TOOL_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").unwrap());

/// Whether a tool name is a safe identifier.
pub fn is_valid_tool_name(name: &str) -> bool {
    TOOL_NAME.is_match(name)
}

/// Drop calls that cannot be dispatched safely. Malformed calls are removed
/// silently; validating an already-validated list returns it unchanged.
pub fn validate_tool_calls(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .filter(|call| {
            let ok = is_valid_tool_name(&call.name);
            if !ok {
                tracing::debug!(id = call.id.as_str(), "dropping tool call with invalid name");
            }
            ok
        })
        .collect()
}
