//! 工具调用归一化模块：把各后端的工具调用输出统一为可执行的调用列表。
//!
//! # Tool-Call Normalization
//!
//! Every backend response passes through the same pipeline before the agent
//! loop sees it:
//!
//! ```text
//! backend message ──► canonical::parse_tool_calls ─┐
//!                                                  ├─► merge ─► validate ─► Vec<ToolCall>
//! content + reasoning ─► fallback::extract_tool_call ┘
//! ```
//!
//! - [`canonical`]: decode the structured `tool_calls` field.
//! - [`fallback`]: recover one call from free text when the model wrote the
//!   call as prose or tag soup. Runs only when the request offered tools.
//! - [`merge`]: repair incomplete structured calls from the fallback, make ids
//!   unique, cap the count.
//! - [`validate`]: drop calls with unsafe names.
//! - [`recovery`]: salvage a backend's `tool_use_failed` rejection.
//!
//! ## Example
//!
//! ```rust
//! use ai_agent_providers::toolcalls::normalize_tool_calls;
//! use serde_json::json;
//!
//! let message = json!({
//!     "content": "",
//!     "tool_calls": [{"id": "c1", "function": {"name": "read_page", "arguments": "{}"}}]
//! });
//! let reasoning = "<arg_key>scope</arg_key><arg_value>viewport</arg_value>";
//!
//! let calls = normalize_tool_calls(&message, "", Some(reasoning), &["read_page"]);
//! assert_eq!(calls[0].id, "c1");
//! assert_eq!(calls[0].arguments["scope"], "viewport");
//! ```

pub mod canonical;
pub mod catalog;
pub mod coerce;
pub mod fallback;
pub mod merge;
pub mod recovery;
pub mod validate;

use serde_json::Value;

use crate::types::tool::ToolCall;

pub use canonical::parse_tool_calls;
pub use fallback::{extract_tool_call, extract_tool_call_with_hint};
pub use merge::{merge_tool_calls, MAX_TOOL_CALLS};
pub use recovery::recover_tool_use_failed;
pub use validate::validate_tool_calls;

/// Run the full pipeline over one backend message.
///
/// `message` is the backend's assistant message object; `content` and
/// `reasoning` are its already-separated text channels; `offered` lists the
/// tool names the request made available.
pub fn normalize_tool_calls(
    message: &Value,
    content: &str,
    reasoning: Option<&str>,
    offered: &[&str],
) -> Vec<ToolCall> {
    let canonical = parse_tool_calls(message);
    let hint = canonical
        .iter()
        .find(|c| c.parse_error.is_some() || !catalog::is_complete(&c.name, &c.arguments))
        .map(|c| c.name.as_str());
    let fallback: Vec<ToolCall> = if offered.is_empty() {
        Vec::new()
    } else {
        extract_tool_call_with_hint(content, reasoning, offered, hint)
            .into_iter()
            .collect()
    };
    if !fallback.is_empty() {
        tracing::debug!(
            canonical = canonical.len(),
            tool = fallback[0].name.as_str(),
            "text fallback produced a tool call"
        );
    }
    merge_tool_calls(canonical, fallback)
}
