//! Cleaning and scalar coercion for argument values captured from free text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*\s*(.*?)\s*```").unwrap());
static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z_][A-Za-z0-9_:-]*[^<>]*>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").unwrap());

/// Tokens models emit for "no value".
const EMPTY_TOKENS: &[&str] = &["undefined", "null", "nan", "none"];

/// Strip code fences and markup, drop wrapping quotes, collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let unfenced = CODE_FENCE.replace_all(raw, "$1");
    let untagged = MARKUP_TAG.replace_all(&unfenced, " ");
    let collapsed = WHITESPACE.replace_all(&untagged, " ");
    strip_wrapping_quotes(collapsed.trim()).trim().to_string()
}

fn strip_wrapping_quotes(s: &str) -> &str {
    for q in ['"', '\'', '`'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn is_empty_token(s: &str) -> bool {
    let inner = s
        .trim()
        .trim_start_matches(['[', '(', '<', '{', '"', '\''])
        .trim_end_matches([']', ')', '>', '}', '"', '\''])
        .trim();
    EMPTY_TOKENS.iter().any(|t| inner.eq_ignore_ascii_case(t))
}

/// Coerce one captured text value into a JSON scalar.
///
/// `undefined`/`null`/`nan` (bare or bracketed) become `""`, `true`/`false`
/// become booleans, pure integer literals become numbers, anything else stays
/// as trimmed text.
pub fn coerce_scalar(text: &str) -> Value {
    let trimmed = text.trim();
    if is_empty_token(trimmed) {
        return Value::String(String::new());
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if INTEGER.is_match(trimmed) {
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Number(n.into());
        }
    }
    Value::String(trimmed.to_string())
}

/// Coerce an already-typed value. Non-strings pass through unchanged, so
/// applying this twice is the same as applying it once.
pub fn coerce_value(value: Value) -> Value {
    match value {
        Value::String(s) => coerce_scalar(&s),
        other => other,
    }
}

/// Parse `[x, y]` / `x, y` coordinate text into a numeric array.
pub fn parse_coordinate(text: &str) -> Option<Value> {
    let inner = text.trim().trim_start_matches(['[', '(']).trim_end_matches([']', ')']);
    let nums: Vec<f64> = inner
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if nums.len() != 2 {
        return None;
    }
    let values = nums
        .into_iter()
        .map(|n| {
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                Value::Number((n as i64).into())
            } else {
                serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
            }
        })
        .collect();
    Some(Value::Array(values))
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
