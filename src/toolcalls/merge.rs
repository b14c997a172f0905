//! Reconcile structured tool calls with calls recovered from text.

use serde_json::{Map, Value};
use std::collections::HashSet;

use super::catalog;
use super::validate::validate_tool_calls;
use crate::types::tool::ToolCall;

/// Upper bound on calls returned from one response.
pub const MAX_TOOL_CALLS: usize = 4;

/// Merge canonical calls with fallback calls.
///
/// A complete canonical call wins. An incomplete one (or one whose arguments
/// failed to decode) is repaired from the fallback call with the same name, or
/// from the only fallback call when there is exactly one. Repaired arguments
/// layer canonical values over fallback values; canonical `null`/blank values
/// count as absent. The result is validated, given unique ids and capped.
pub fn merge_tool_calls(canonical: Vec<ToolCall>, fallback: Vec<ToolCall>) -> Vec<ToolCall> {
    let merged = if canonical.is_empty() {
        fallback.clone()
    } else {
        canonical
            .into_iter()
            .map(|call| repair(call, &fallback))
            .collect()
    };

    let mut validated = validate_tool_calls(merged);
    if validated.is_empty() && !fallback.is_empty() {
        validated = validate_tool_calls(fallback);
    }

    let mut out = dedupe_ids(validated);
    if out.len() > MAX_TOOL_CALLS {
        tracing::debug!(count = out.len(), max = MAX_TOOL_CALLS, "truncating tool calls");
        out.truncate(MAX_TOOL_CALLS);
    }
    out
}

fn repair(call: ToolCall, fallback: &[ToolCall]) -> ToolCall {
    if call.parse_error.is_none() && catalog::is_complete(&call.name, &call.arguments) {
        return call;
    }

    let donor = fallback
        .iter()
        .find(|f| !call.name.is_empty() && f.name == call.name)
        .or_else(|| match fallback {
            [only] => Some(only),
            _ => None,
        });
    let Some(donor) = donor else {
        return call;
    };

    let mut arguments: Map<String, Value> = donor.arguments.clone();
    for (key, value) in &call.arguments {
        if catalog::has_value(&call.arguments, key) {
            arguments.insert(key.clone(), value.clone());
        }
    }

    let id = if call.id.trim().is_empty() {
        donor.id.clone()
    } else {
        call.id
    };
    let name = if call.name.trim().is_empty() {
        donor.name.clone()
    } else {
        call.name
    };
    let parse_error = if catalog::is_complete(&name, &arguments) {
        None
    } else {
        call.parse_error
    };

    tracing::debug!(tool = name.as_str(), "repaired tool call from text fallback");
    ToolCall {
        id,
        name,
        arguments,
        parse_error,
    }
}

/// Suffix repeated ids with `_2`, `_3`, ... in order of appearance.
fn dedupe_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen: HashSet<String> = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if !seen.insert(call.id.clone()) {
                let base = call.id.clone();
                let mut n = 2;
                while seen.contains(&format!("{}_{}", base, n)) {
                    n += 1;
                }
                call.id = format!("{}_{}", base, n);
                seen.insert(call.id.clone());
            }
            call
        })
        .collect()
}
