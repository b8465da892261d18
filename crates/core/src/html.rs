//! Text helpers for event bodies and log lines.

use std::sync::OnceLock;

use regex::Regex;

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(ch),
        }
    }
    result
}

/// Cut `text` to at most `max` characters, ending with `...` when cut.
pub fn abbreviate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Collapse all whitespace runs into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One-line, abbreviated rendering of user text, safe for log output.
pub fn printable(text: &str) -> String {
    abbreviate(&collapse_whitespace(text), 50)
}

fn secrets() -> &'static Regex {
    static SECRETS: OnceLock<Regex> = OnceLock::new();
    SECRETS.get_or_init(|| {
        Regex::new(r"\bgh[pousr]_[A-Za-z0-9]{16,}\b|\bgithub_pat_[A-Za-z0-9_]{20,}\b|\b[0-9]{6,}:[A-Za-z0-9_-]{30,}\b")
            .expect("secret pattern is valid")
    })
}

/// Mask GitHub and Telegram bot tokens so error text can be shown to users.
pub fn redact(text: &str) -> String {
    secrets().replace_all(text, "[REDACTED]").into_owned()
}
