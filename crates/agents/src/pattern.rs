//! Filter patterns taken from pipe JSON.
//!
//! A pattern is either a literal string, matched as a case-sensitive
//! substring, or a `/regex/` matched case-insensitively with multi-line
//! anchors and `.` matching newlines.

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::agent::AgentError;

/// One compiled pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn parse(source: &str) -> Result<Self, AgentError> {
        let regex = match source
            .strip_prefix('/')
            .and_then(|s| s.strip_suffix('/'))
        {
            Some(inner) => RegexBuilder::new(inner)
                .case_insensitive(true)
                .multi_line(true)
                .dot_matches_new_line(true)
                .build()
                .map_err(|e| {
                    AgentError::Config(format!("Invalid regular expression {source}: {e}"))
                })?,
            None => Regex::new(&regex::escape(source))
                .map_err(|e| AgentError::Config(format!("Invalid pattern {source}: {e}")))?,
        };
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// A set of patterns; matches when any member matches.
#[derive(Debug, Clone, Default)]
pub struct Patterns {
    items: Vec<Pattern>,
}

impl Patterns {
    /// Read `json[field]`, which may be absent, a string, or an array of strings.
    pub fn from_json(json: &Value, field: &str) -> Result<Self, AgentError> {
        let items = match json.get(field) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => vec![Pattern::parse(s)?],
            Some(Value::Array(list)) => list
                .iter()
                .map(|item| match item {
                    Value::String(s) => Pattern::parse(s),
                    other => Err(AgentError::Config(format!(
                        "Every item of \"{field}\" must be a string, but {other} is not"
                    ))),
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(AgentError::Config(format!(
                    "\"{field}\" must be an array of strings, not {other}"
                )))
            }
        };
        Ok(Self { items })
    }

    /// The first pattern matching `text`, if any.
    pub fn find(&self, text: &str) -> Option<&Pattern> {
        self.items.iter().find(|p| p.is_match(text))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_is_quoted_and_case_sensitive() {
        let p = Pattern::parse("a.b (c)").unwrap();
        assert!(p.is_match("xx a.b (c) yy"));
        assert!(!p.is_match("aXb (c)"));
        assert!(!p.is_match("A.B (C)"));
    }

    #[test]
    fn slashed_regex_is_case_insensitive_and_dotall() {
        let p = Pattern::parse("/^hello.+world$/").unwrap();
        assert!(p.is_match("first line\nHELLO\nthere WORLD"));
        assert!(!p.is_match("hello"));
    }

    #[test]
    fn lone_slash_is_literal() {
        let p = Pattern::parse("/").unwrap();
        assert!(p.is_match("a/b"));
        assert!(!p.is_match("ab"));
    }

    #[test]
    fn invalid_regex_is_config_error() {
        let err = Pattern::parse("/[unclosed/").unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
        assert!(err.to_string().contains("[unclosed"));
    }

    #[test]
    fn set_from_json_array() {
        let cfg = json!({"ignore": ["spam", "/^bot:/"]});
        let set = Patterns::from_json(&cfg, "ignore").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.find("this is spam").unwrap().source(), "spam");
        assert_eq!(set.find("BOT: ping").unwrap().source(), "/^bot:/");
        assert!(set.find("hello").is_none());
    }

    #[test]
    fn set_from_missing_field_is_empty() {
        let set = Patterns::from_json(&json!({"kind": "x"}), "boost").unwrap();
        assert!(set.is_empty());
        assert!(set.find("anything").is_none());
    }

    #[test]
    fn set_accepts_single_string() {
        let set = Patterns::from_json(&json!({"boost": "urgent"}), "boost").unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn set_rejects_non_strings() {
        assert!(Patterns::from_json(&json!({"ignore": [1]}), "ignore").is_err());
        assert!(Patterns::from_json(&json!({"ignore": {"a": 1}}), "ignore").is_err());
    }
}
