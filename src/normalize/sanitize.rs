use regex::Regex;
use std::sync::OnceLock;

/// A fence line with its language tag (```json alone on a line), or any
/// other bare triple backtick. Tags are only recognised on their own line.
fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_+-]*[ \t]*$|```").expect("static regex"))
}

/// Typographic punctuation models like to emit, mapped to ASCII before the
/// non-ASCII sweep so words do not run together.
fn ascii_fold(c: char) -> Option<char> {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201B}' => Some('\''),
        '\u{201C}' | '\u{201D}' => Some('"'),
        '\u{2010}'..='\u{2015}' | '\u{2212}' => Some('-'),
        '\u{2022}' | '\u{00B7}' => Some(' '),
        '\u{00A0}' | '\u{2009}' | '\u{202F}' => Some(' '),
        _ => None,
    }
}

/// Cleans one free-text field: fences and backticks removed, only printable
/// ASCII kept, whitespace runs collapsed, trimmed.
pub fn clean_text(s: &str) -> String {
    let unfenced = fence_re().replace_all(s, " ");
    let printable: String = unfenced
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                return Some(' ');
            }
            if let Some(folded) = ascii_fold(c) {
                return Some(folded);
            }
            (c.is_ascii_graphic() && c != '`').then_some(c)
        })
        .collect();
    printable.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Markdown emphasis markers, for prose headings and bullets.
pub fn strip_emphasis(s: &str) -> String {
    s.replace("**", "").replace("__", "")
}
