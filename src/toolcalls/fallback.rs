//! 文本兜底解析：从自由文本中恢复模型意图的工具调用。
//!
//! Fallback tool-call extraction from free text.
//!
//! Weaker or instruction-drifted models often describe a tool call in prose or
//! imitate the structured format with tag soup instead of filling the structured
//! field. This module recovers at most one such call per response. Every pass is
//! a pure function over the scratch buffer so each can be tested in isolation:
//!
//! 1. [`detect_tool_name`]: explicit `<tool_call>` marker, then a bare-JSON
//!    `"name"`, then the earliest whole-word known tool name.
//! 2. [`extract_pairs`]: well-formed `<arg_key>/<arg_value>` tags, then truncated
//!    tag variants, then bare JSON objects, then `key: value` free text.
//! 3. Terminal heuristics for `done` / `fail` when no pairs were found.
//! 4. Legacy flat actions (`click`, `type`, ...) nested under `computer.action`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::catalog::{self, LegacyAlias, COMPUTER_TOOL, DONE_TOOL, FAIL_TOOL};
use super::coerce::{clean_text, coerce_scalar, coerce_value, parse_coordinate, truncate_chars};
use crate::types::tool::ToolCall;

pub const MAX_SUMMARY_CHARS: usize = 180;
pub const MAX_ANSWER_CHARS: usize = 3000;
pub const MAX_REASON_CHARS: usize = 280;

static TOOL_CALL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<tool_call>\s*([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static JSON_NAME_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:name|tool|function)"\s*:\s*"([A-Za-z_][A-Za-z0-9_]*)""#).unwrap());
static KNOWN_NAME_WORD: Lazy<Regex> = Lazy::new(|| {
    let mut names: Vec<&str> = catalog::known_tool_names().collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    let alternation = names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b({})\b", alternation)).unwrap()
});
static ACTION_WORD: Lazy<Regex> = Lazy::new(|| {
    let alternation = catalog::COMPUTER_ACTIONS
        .iter()
        .chain(std::iter::once(&"click"))
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b({})\b", alternation)).unwrap()
});

static WELL_FORMED_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<arg_key>\s*([A-Za-z_][A-Za-z0-9_]*)\s*</arg_key>\s*<arg_value>(.*?)</arg_value>")
        .unwrap()
});
static MISSING_KEY_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)(?:^|[\s>])([A-Za-z_][A-Za-z0-9_]*)\s*</arg_key>\s*<arg_value>(.*?)(?:</arg_value>|<arg_key>|</tool_call>|$)",
    )
    .unwrap()
});
static MISSING_VALUE_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<arg_key>\s*([A-Za-z_][A-Za-z0-9_]*)\s*</arg_key>\s*(?:<arg_value>)?(.*?)(?:</arg_value>|<arg_key>|</tool_call>|$)",
    )
    .unwrap()
});
static BARE_KEY_MARKER: Lazy<Regex> = Lazy::new(|| {
    let alternation = catalog::ALLOWED_ARG_KEYS.join("|");
    Regex::new(&format!(
        r#"(?i)\b({})\b["']?\s*(?:[:=]|</?arg_value>)\s*"#,
        alternation
    ))
    .unwrap()
});

static SUMMARY_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\bsummary\b\s*[:=]\s*(.+?)(?:\n\s*\n|\banswer\b\s*[:=]|$)").unwrap()
});
static ANSWER_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\banswer\b\s*[:=]\s*(.+?)(?:\n\s*\n|\bsummary\b\s*[:=]|$)").unwrap()
});
static SOURCE_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)\bsource:\s*(.+)$").unwrap());
static REASON_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\breason\b\s*[:=]\s*(.+?)(?:\n\s*\n|$)").unwrap());

/// How the tool name was found in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    /// `<tool_call>name` marker or a JSON `"name"` field.
    Explicit,
    /// Whole-word mention in free text.
    Mention,
    /// Name of an incomplete structured call in the same response.
    Hint,
}

/// A raw `(key, value)` capture before cleaning.
pub type RawPair = (String, String);

/// Recover at most one tool call from primary content and the reasoning channel.
///
/// `offered` is the list of tool names the request made available; when it is
/// non-empty, only calls resolving to one of those names are returned.
pub fn extract_tool_call(content: &str, reasoning: Option<&str>, offered: &[&str]) -> Option<ToolCall> {
    extract_tool_call_with_hint(content, reasoning, offered, None)
}

/// Like [`extract_tool_call`], with the name of an incomplete structured call
/// to use when the text carries arguments but no explicit tool marker.
pub fn extract_tool_call_with_hint(
    content: &str,
    reasoning: Option<&str>,
    offered: &[&str],
    hint: Option<&str>,
) -> Option<ToolCall> {
    let buffer = scratch_buffer(content, reasoning);
    if buffer.trim().is_empty() {
        return None;
    }

    let (detected, source) = detect_tool_name_with_hint(&buffer, offered, hint)?;
    let mut args = pairs_to_arguments(extract_pairs(&buffer));

    let (mut name, action) = resolve_alias(&detected, offered);
    if let Some(action) = action {
        if !catalog::has_value(&args, "action") {
            args.insert("action".into(), Value::String(action.into()));
        }
    }

    if args.is_empty() && source != NameSource::Hint && catalog::is_terminal(&name) {
        args = terminal_arguments(&name, &buffer, &detected)?;
    }
    if args.is_empty() && source != NameSource::Explicit {
        return None;
    }

    if name == COMPUTER_TOOL && !catalog::has_value(&args, "action") {
        if let Some(action) = infer_action(&args, &buffer) {
            args.insert("action".into(), Value::String(action));
        }
    }

    bound_terminal_fields(&name, &mut args);

    if !offered.is_empty() && !offered.contains(&name.as_str()) {
        if offered.contains(&detected.as_str()) {
            name = detected;
        } else {
            tracing::debug!(tool = name.as_str(), "recovered tool is not offered by the request");
            return None;
        }
    }

    let id = synthetic_id(&name, &args);
    Some(ToolCall::new(id, name, args))
}

/// Concatenate primary content and reasoning text into one buffer.
pub fn scratch_buffer(content: &str, reasoning: Option<&str>) -> String {
    match reasoning.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) if !content.trim().is_empty() => format!("{}\n{}", content, r),
        Some(r) => r.to_string(),
        None => content.to_string(),
    }
}

/// Find the intended tool name. First match wins.
pub fn detect_tool_name(buffer: &str, offered: &[&str]) -> Option<(String, NameSource)> {
    detect_tool_name_with_hint(buffer, offered, None)
}

fn detect_tool_name_with_hint(
    buffer: &str,
    offered: &[&str],
    hint: Option<&str>,
) -> Option<(String, NameSource)> {
    let acceptable = |name: &str| catalog::is_known_tool(name) && is_reachable(name, offered);

    for re in [&*TOOL_CALL_MARKER, &*JSON_NAME_FIELD] {
        for caps in re.captures_iter(buffer) {
            let name = caps[1].to_ascii_lowercase();
            if acceptable(&name) {
                return Some((name, NameSource::Explicit));
            }
        }
    }

    if let Some(hint) = hint.filter(|h| !h.is_empty() && is_reachable(h, offered)) {
        return Some((hint.to_string(), NameSource::Hint));
    }

    KNOWN_NAME_WORD
        .find_iter(buffer)
        .map(|m| m.as_str().to_ascii_lowercase())
        .find(|name| acceptable(name))
        .map(|name| (name, NameSource::Mention))
}

/// Whether `name` (or what it aliases to) is something the request offered.
fn is_reachable(name: &str, offered: &[&str]) -> bool {
    if offered.is_empty() || offered.contains(&name) {
        return true;
    }
    match catalog::legacy_alias(name) {
        Some(LegacyAlias::ComputerAction(_)) => offered.contains(&COMPUTER_TOOL),
        Some(LegacyAlias::Rename(target)) => offered.contains(&target),
        None => false,
    }
}

/// Map a detected name to its canonical tool plus an implied `computer` action.
fn resolve_alias(detected: &str, offered: &[&str]) -> (String, Option<&'static str>) {
    match catalog::legacy_alias(detected) {
        Some(LegacyAlias::ComputerAction(action))
            if offered.is_empty() || offered.contains(&COMPUTER_TOOL) =>
        {
            (COMPUTER_TOOL.to_string(), Some(action))
        }
        Some(LegacyAlias::Rename(target)) if offered.is_empty() || offered.contains(&target) => {
            (target.to_string(), None)
        }
        _ => (detected.to_string(), None),
    }
}

/// Run the argument passes in order, stopping at the first that yields any
/// allow-listed pair. Duplicate `(key, value)` pairs are removed.
pub fn extract_pairs(buffer: &str) -> Vec<RawPair> {
    let passes: [fn(&str) -> Vec<RawPair>; 4] = [
        well_formed_pairs,
        malformed_tag_pairs,
        bare_json_pairs,
        bare_key_pairs,
    ];
    for pass in passes {
        let mut pairs: Vec<RawPair> = Vec::new();
        for (key, value) in pass(buffer) {
            let key = key.to_ascii_lowercase();
            if catalog::is_allowed_arg(&key) && !pairs.iter().any(|(k, v)| *k == key && *v == value) {
                pairs.push((key, value));
            }
        }
        if !pairs.is_empty() {
            return pairs;
        }
    }
    Vec::new()
}

/// `<arg_key>k</arg_key><arg_value>v</arg_value>`
pub fn well_formed_pairs(buffer: &str) -> Vec<RawPair> {
    WELL_FORMED_PAIR
        .captures_iter(buffer)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// Tag pairs with a truncated opening `<arg_key>` or missing `<arg_value>` tags.
pub fn malformed_tag_pairs(buffer: &str) -> Vec<RawPair> {
    let mut pairs: Vec<RawPair> = MISSING_KEY_OPEN
        .captures_iter(buffer)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();
    if pairs.is_empty() {
        pairs = MISSING_VALUE_TAGS
            .captures_iter(buffer)
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
    }
    pairs
}

/// Top-level keys of JSON objects embedded in the text. When an object carries
/// `arguments`/`parameters`, those are used instead of its own keys.
pub fn bare_json_pairs(buffer: &str) -> Vec<RawPair> {
    let mut pairs = Vec::new();
    for candidate in json_objects(buffer).into_iter().take(8) {
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        let args = ["arguments", "parameters", "input"]
            .iter()
            .find_map(|k| match obj.get(*k) {
                Some(Value::Object(map)) => Some(map.clone()),
                Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
                    Ok(Value::Object(map)) => Some(map),
                    _ => None,
                },
                _ => None,
            })
            .unwrap_or(obj);
        for (k, v) in args {
            let text = match v {
                Value::String(s) => s,
                Value::Null => continue,
                other => other.to_string(),
            };
            pairs.push((k, text));
        }
    }
    pairs
}

/// Last resort: `key: free text` up to the next key marker, newline or tag.
pub fn bare_key_pairs(buffer: &str) -> Vec<RawPair> {
    let markers: Vec<_> = BARE_KEY_MARKER.captures_iter(buffer).collect();
    let mut pairs = Vec::new();
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let next_marker = markers
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map_or(buffer.len(), |m| m.start());
        let segment = &buffer[whole.end()..next_marker];
        let end = segment.find(['\n', '<']).unwrap_or(segment.len());
        let value = segment[..end].trim().trim_end_matches([',', ';']).trim();
        if !value.is_empty() {
            pairs.push((key.as_str().to_string(), value.to_string()));
        }
    }
    pairs
}

/// Balanced `{...}` slices, string-aware.
fn json_objects(buffer: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in buffer.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        out.push(&buffer[s..=idx]);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// Clean and coerce raw captures into an arguments record. The first value
/// seen for a key wins.
pub fn pairs_to_arguments(pairs: Vec<RawPair>) -> Map<String, Value> {
    let mut args = Map::new();
    for (key, raw) in pairs {
        if args.contains_key(&key) {
            continue;
        }
        let cleaned = clean_text(&raw);
        let value = if key == "coordinate" || key == "start_coordinate" {
            parse_coordinate(&cleaned).unwrap_or_else(|| coerce_scalar(&cleaned))
        } else if cleaned.starts_with('[') || cleaned.starts_with('{') {
            match serde_json::from_str::<Value>(&cleaned) {
                Ok(v @ (Value::Array(_) | Value::Object(_))) => v,
                _ => coerce_scalar(&cleaned),
            }
        } else {
            coerce_value(Value::String(cleaned))
        };
        args.insert(key, value);
    }
    args
}

/// Looser heuristics for `done` / `fail` when no key/value pairs exist.
///
/// `done` needs a labelled `summary`/`answer` or a `source:` marker. Only
/// `fail` falls back to the text around the mention.
fn terminal_arguments(name: &str, buffer: &str, detected: &str) -> Option<Map<String, Value>> {
    let segment = |re: &Regex| {
        re.captures(buffer)
            .map(|c| clean_text(&c[1]))
            .filter(|s| !s.is_empty())
    };

    let mut args = Map::new();
    match name {
        DONE_TOOL => {
            let summary = segment(&SUMMARY_SEGMENT);
            let answer = segment(&ANSWER_SEGMENT)
                .or_else(|| segment(&SOURCE_SEGMENT))
                .or_else(|| summary.clone())?;
            let summary = summary.unwrap_or_else(|| answer.clone());
            args.insert(
                "summary".into(),
                Value::String(truncate_chars(&summary, MAX_SUMMARY_CHARS)),
            );
            args.insert(
                "answer".into(),
                Value::String(truncate_chars(&answer, MAX_ANSWER_CHARS)),
            );
        }
        FAIL_TOOL => {
            let reason = segment(&REASON_SEGMENT).or_else(|| {
                Some(text_around_name(&clean_text(buffer), detected)).filter(|s| !s.is_empty())
            })?;
            args.insert(
                "reason".into(),
                Value::String(truncate_chars(&reason, MAX_REASON_CHARS)),
            );
        }
        _ => return None,
    }
    Some(args)
}

fn bound_terminal_fields(name: &str, args: &mut Map<String, Value>) {
    let limits: &[(&str, usize)] = match name {
        DONE_TOOL => &[("summary", MAX_SUMMARY_CHARS), ("answer", MAX_ANSWER_CHARS)],
        FAIL_TOOL => &[("reason", MAX_REASON_CHARS)],
        _ => return,
    };
    for (key, max) in limits {
        if let Some(Value::String(s)) = args.get_mut(*key) {
            if s.chars().count() > *max {
                *s = truncate_chars(s, *max);
            }
        }
    }
}

/// Text following the first mention of `word`, or the text before it when
/// nothing follows.
fn text_around_name(text: &str, word: &str) -> String {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(word));
    let Some(m) = Regex::new(&pattern).ok().and_then(|re| re.find(text)) else {
        return text.to_string();
    };
    let after = text[m.end()..].trim_start_matches([':', '-', '.', ',', ' ']).trim();
    if after.is_empty() {
        text[..m.start()].trim().to_string()
    } else {
        after.to_string()
    }
}

/// Infer a missing `computer` action from argument presence, then from action
/// words in the buffer.
pub fn infer_action(args: &Map<String, Value>, buffer: &str) -> Option<String> {
    if catalog::has_value(args, "key") {
        return Some("key".into());
    }
    if catalog::has_value(args, "text") {
        return Some("type".into());
    }
    ACTION_WORD.find(buffer).map(|m| {
        let word = m.as_str().to_ascii_lowercase();
        if word == "click" {
            "left_click".to_string()
        } else {
            word
        }
    })
}

/// Deterministic id derived from the call's content.
fn synthetic_id(name: &str, args: &Map<String, Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(Value::Object(args.clone()).to_string().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("fallback_{}", hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_formed_tag_soup() {
        let text = "<tool_call>read_page<arg_key>scope</arg_key><arg_value>viewport</arg_value></tool_call>";
        let call = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(call.name, "read_page");
        assert_eq!(call.arguments, json!({"scope": "viewport"}).as_object().cloned().unwrap());
        assert!(call.id.starts_with("fallback_"));
    }

    #[test]
    fn truncated_opening_key_tag() {
        let text = "<tool_call>navigate\nurl</arg_key><arg_value>https://example.com</arg_value>";
        let call = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(call.name, "navigate");
        assert_eq!(call.arguments["url"], "https://example.com");
    }

    #[test]
    fn missing_value_tags() {
        let pairs = malformed_tag_pairs("<arg_key>query</arg_key> login button</tool_call>");
        assert_eq!(pairs, vec![("query".to_string(), "login button".to_string())]);
    }

    #[test]
    fn unknown_keys_are_discarded() {
        let text = "<tool_call>find<arg_key>query</arg_key><arg_value>search box</arg_value>\
                    <arg_key>evil</arg_key><arg_value>rm -rf</arg_value>";
        let call = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(call.arguments.len(), 1);
        assert_eq!(call.arguments["query"], "search box");
    }

    #[test]
    fn duplicate_pairs_collapse() {
        let text = "<arg_key>url</arg_key><arg_value>a</arg_value><arg_key>url</arg_key><arg_value>a</arg_value>";
        assert_eq!(extract_pairs(text).len(), 1);
    }

    #[test]
    fn bare_json_in_prose() {
        let text = r#"I will call {"name": "navigate", "arguments": {"url": "https://docs.rs"}} now."#;
        let call = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(call.name, "navigate");
        assert_eq!(call.arguments["url"], "https://docs.rs");
    }

    #[test]
    fn bare_key_value_last_resort() {
        let text = "Next I should use find with query: submit button, filter: visible\nthanks";
        let pairs = bare_key_pairs(text);
        assert_eq!(
            pairs,
            vec![
                ("query".to_string(), "submit button".to_string()),
                ("filter".to_string(), "visible".to_string()),
            ]
        );
        let call = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(call.name, "find");
        assert_eq!(call.arguments["query"], "submit button");
    }

    #[test]
    fn values_are_coerced() {
        let text = "<tool_call>computer<arg_key>action</arg_key><arg_value>scroll</arg_value>\
                    <arg_key>amount</arg_key><arg_value>3</arg_value>\
                    <arg_key>coordinate</arg_key><arg_value>[10, 20]</arg_value>\
                    <arg_key>text</arg_key><arg_value>undefined</arg_value>";
        let call = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(call.arguments["amount"], json!(3));
        assert_eq!(call.arguments["coordinate"], json!([10, 20]));
        assert_eq!(call.arguments["text"], json!(""));
    }

    #[test]
    fn reasoning_channel_is_scanned() {
        let call = extract_tool_call(
            "",
            Some("I need the page. <tool_call>get_page_text</tool_call>"),
            &[],
        )
        .unwrap();
        assert_eq!(call.name, "get_page_text");
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn prose_mention_without_arguments_is_ignored() {
        assert!(extract_tool_call("You could navigate there yourself.", None, &[]).is_none());
    }

    #[test]
    fn legacy_click_nests_under_computer() {
        let text = "<tool_call>click<arg_key>coordinate</arg_key><arg_value>[5, 6]</arg_value>";
        let call = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(call.name, "computer");
        assert_eq!(call.arguments["action"], "left_click");
        assert_eq!(call.arguments["coordinate"], json!([5, 6]));
    }

    #[test]
    fn legacy_name_stays_flat_when_container_not_offered() {
        let text = "<tool_call>click<arg_key>target</arg_key><arg_value>#go</arg_value>";
        let call = extract_tool_call(text, None, &["click"]).unwrap();
        assert_eq!(call.name, "click");
        assert!(!call.arguments.contains_key("action"));
    }

    #[test]
    fn ambiguous_action_inferred_from_arguments() {
        let text = "<tool_call>computer<arg_key>text</arg_key><arg_value>hello</arg_value>";
        let call = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(call.arguments["action"], "type");

        let text = "<tool_call>computer<arg_key>key</arg_key><arg_value>Enter</arg_value>";
        let call = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(call.arguments["action"], "key");
    }

    #[test]
    fn ambiguous_action_inferred_from_buffer_words() {
        let text = "I will double_click the row. <tool_call>computer<arg_key>coordinate</arg_key><arg_value>[1,2]</arg_value>";
        let call = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(call.arguments["action"], "double_click");
    }

    #[test]
    fn done_with_labeled_segments() {
        let text = "done\nsummary: Found the price\nanswer: The laptop costs $999.";
        let call = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(call.name, "done");
        assert_eq!(call.arguments["summary"], "Found the price");
        assert_eq!(call.arguments["answer"], "The laptop costs $999.");
    }

    #[test]
    fn done_with_source_marker_synthesizes_both_fields() {
        let long = "x".repeat(4000);
        let text = format!("Task done. source: {}", long);
        let call = extract_tool_call(&text, None, &[]).unwrap();
        assert_eq!(call.arguments["answer"].as_str().unwrap().chars().count(), MAX_ANSWER_CHARS);
        assert_eq!(call.arguments["summary"].as_str().unwrap().chars().count(), MAX_SUMMARY_CHARS);
    }

    #[test]
    fn unlabelled_done_mention_is_not_a_call() {
        assert!(extract_tool_call("Let me think about what needs to be done next.", None, &[]).is_none());
        assert!(extract_tool_call(
            "I have not done anything yet; the page is still loading.",
            None,
            &["done", "fail", "read_page"],
        )
        .is_none());
    }

    #[test]
    fn fail_reason_is_bounded() {
        let text = format!("fail reason: {}", "blocked ".repeat(100));
        let call = extract_tool_call(&text, None, &[]).unwrap();
        assert_eq!(call.name, "fail");
        assert!(call.arguments["reason"].as_str().unwrap().chars().count() <= MAX_REASON_CHARS);
    }

    #[test]
    fn fail_without_label_uses_text_prefix() {
        let call = extract_tool_call("I must fail: the site requires a captcha", None, &[]).unwrap();
        assert_eq!(call.arguments["reason"], "the site requires a captcha");
    }

    #[test]
    fn offered_tools_restrict_detection() {
        let text = "<tool_call>navigate<arg_key>url</arg_key><arg_value>https://a.b</arg_value>";
        assert!(extract_tool_call(text, None, &["read_page"]).is_none());
        assert!(extract_tool_call(text, None, &["navigate"]).is_some());
    }

    #[test]
    fn first_mention_wins() {
        let (name, source) = detect_tool_name("Maybe find it, or navigate away", &[]).unwrap();
        assert_eq!(name, "find");
        assert_eq!(source, NameSource::Mention);
    }

    #[test]
    fn hint_names_bare_argument_tags() {
        let reasoning = "<arg_key>scope</arg_key><arg_value>viewport</arg_value>";
        assert!(extract_tool_call("", Some(reasoning), &["read_page"]).is_none());
        let call = extract_tool_call_with_hint("", Some(reasoning), &["read_page"], Some("read_page")).unwrap();
        assert_eq!(call.name, "read_page");
        assert_eq!(call.arguments["scope"], "viewport");
    }

    #[test]
    fn ids_are_deterministic() {
        let text = "<tool_call>navigate<arg_key>url</arg_key><arg_value>https://a.b</arg_value>";
        let a = extract_tool_call(text, None, &[]).unwrap();
        let b = extract_tool_call(text, None, &[]).unwrap();
        assert_eq!(a.id, b.id);
    }
}
