//! Closed catalog of browser-agent tools: canonical names, legacy aliases,
//! recognized argument keys and per-tool completeness rules.

use serde_json::{Map, Value};

/// Pointer/keyboard container tool that legacy flat actions are nested under.
pub const COMPUTER_TOOL: &str = "computer";
pub const DONE_TOOL: &str = "done";
pub const FAIL_TOOL: &str = "fail";

struct ToolSpec {
    name: &'static str,
    /// Fields that must be non-empty. Empty means "at least one argument".
    required: &'static [&'static str],
    /// When true, any one of `required` is enough.
    any_of: bool,
}

const TOOLS: &[ToolSpec] = &[
    ToolSpec { name: COMPUTER_TOOL, required: &["action"], any_of: false },
    ToolSpec { name: "navigate", required: &["url"], any_of: false },
    ToolSpec { name: "read_page", required: &[], any_of: false },
    ToolSpec { name: "find", required: &["query"], any_of: false },
    ToolSpec { name: "form_input", required: &["value"], any_of: false },
    ToolSpec { name: "get_page_text", required: &[], any_of: false },
    ToolSpec { name: "tabs_create", required: &[], any_of: false },
    ToolSpec { name: "tabs_switch", required: &["tab_id"], any_of: false },
    ToolSpec { name: "tabs_close", required: &[], any_of: false },
    ToolSpec { name: DONE_TOOL, required: &["summary", "answer"], any_of: true },
    ToolSpec { name: FAIL_TOOL, required: &["reason"], any_of: false },
];

/// How a legacy tool name maps onto the canonical catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyAlias {
    /// Flat action nested as `computer { action: <action> }`.
    ComputerAction(&'static str),
    /// Plain rename to another canonical tool.
    Rename(&'static str),
}

const LEGACY_ALIASES: &[(&str, LegacyAlias)] = &[
    ("click", LegacyAlias::ComputerAction("left_click")),
    ("left_click", LegacyAlias::ComputerAction("left_click")),
    ("right_click", LegacyAlias::ComputerAction("right_click")),
    ("double_click", LegacyAlias::ComputerAction("double_click")),
    ("type", LegacyAlias::ComputerAction("type")),
    ("key", LegacyAlias::ComputerAction("key")),
    ("press_key", LegacyAlias::ComputerAction("key")),
    ("scroll", LegacyAlias::ComputerAction("scroll")),
    ("hover", LegacyAlias::ComputerAction("hover")),
    ("screenshot", LegacyAlias::ComputerAction("screenshot")),
    ("goto", LegacyAlias::Rename("navigate")),
    ("open_url", LegacyAlias::Rename("navigate")),
    ("finish", LegacyAlias::Rename(DONE_TOOL)),
    ("task_complete", LegacyAlias::Rename(DONE_TOOL)),
    ("give_up", LegacyAlias::Rename(FAIL_TOOL)),
];

/// Actions accepted by the `computer` tool, longest first so that scanning
/// text for `double_click` does not stop at `click`.
pub const COMPUTER_ACTIONS: &[&str] = &[
    "left_click_drag",
    "double_click",
    "triple_click",
    "right_click",
    "left_click",
    "screenshot",
    "scroll",
    "hover",
    "type",
    "wait",
    "key",
];

/// Argument names the fallback extractor may populate.
pub const ALLOWED_ARG_KEYS: &[&str] = &[
    "action",
    "coordinate",
    "start_coordinate",
    "text",
    "key",
    "url",
    "scope",
    "filter",
    "query",
    "ref",
    "target",
    "selector",
    "element",
    "value",
    "direction",
    "amount",
    "scroll_direction",
    "scroll_amount",
    "tab_id",
    "duration",
    "index",
    "summary",
    "answer",
    "reason",
];

/// Every tool name the extractor recognizes, canonical names first.
pub fn known_tool_names() -> impl Iterator<Item = &'static str> {
    TOOLS
        .iter()
        .map(|t| t.name)
        .chain(LEGACY_ALIASES.iter().map(|(name, _)| *name))
}

pub fn is_known_tool(name: &str) -> bool {
    known_tool_names().any(|n| n.eq_ignore_ascii_case(name))
}

pub fn is_allowed_arg(key: &str) -> bool {
    ALLOWED_ARG_KEYS.contains(&key)
}

pub fn legacy_alias(name: &str) -> Option<LegacyAlias> {
    LEGACY_ALIASES
        .iter()
        .find(|(legacy, _)| legacy.eq_ignore_ascii_case(name))
        .map(|(_, alias)| *alias)
}

pub fn is_terminal(name: &str) -> bool {
    name == DONE_TOOL || name == FAIL_TOOL
}

/// A value counts as present when it is not null and not a blank string.
pub fn has_value(args: &Map<String, Value>, key: &str) -> bool {
    match args.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Per-tool completeness predicate used by the merger.
pub fn is_complete(name: &str, args: &Map<String, Value>) -> bool {
    let Some(spec) = TOOLS.iter().find(|t| t.name == name) else {
        return !args.is_empty();
    };
    if spec.required.is_empty() {
        return !args.is_empty();
    }
    if spec.any_of {
        spec.required.iter().any(|k| has_value(args, k))
    } else {
        spec.required.iter().all(|k| has_value(args, k))
    }
}
