use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```json\s*(.*?)```").expect("static regex"))
}

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",(\s*[\]}])").expect("static regex"))
}

fn parse_object(s: &str) -> Option<Value> {
    serde_json::from_str::<Value>(s.trim()).ok().filter(Value::is_object)
}

fn fenced_block(text: &str) -> Option<&str> {
    fenced_json_re().captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

pub fn strip_trailing_commas(s: &str) -> String {
    trailing_comma_re().replace_all(s, "$1").into_owned()
}

/// Parses as-is, then again with trailing commas removed.
fn parse_lenient(s: &str) -> Option<Value> {
    parse_object(s).or_else(|| parse_object(&strip_trailing_commas(s)))
}

/// First JSON object found in a model reply. Tries, in order: the whole
/// text, a ```json fenced block, and the outermost `{...}` span. Each is
/// also tried with trailing commas removed.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    parse_lenient(trimmed)
        .or_else(|| fenced_block(trimmed).and_then(parse_lenient))
        .or_else(|| outer_braces(trimmed).and_then(parse_lenient))
}
