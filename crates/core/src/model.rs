use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pipe identifier, unique across all users.
pub type PipeId = u64;

/// A user-configured job descriptor, executed on every routine tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipe {
    pub id: PipeId,
    /// URN of the owning user, e.g. `urn:github:526301`.
    pub urn: String,
    /// Raw JSON configuration, exactly as the user saved it.
    pub json: String,
    /// Outcome of the most recent execution.
    pub status: String,
    pub created: DateTime<Utc>,
}

/// A user-visible notification record. The title is the merge key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub urn: String,
    pub title: String,
    pub text: String,
    pub rank: i64,
    pub time: DateTime<Utc>,
}

impl Event {
    /// Render the text as HTML, turning `[label](url)` into anchors.
    pub fn html(&self) -> String {
        static LINK: OnceLock<Regex> = OnceLock::new();
        let link = LINK.get_or_init(|| {
            Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link pattern is valid")
        });
        link.replace_all(&self.text, "<a href='$2'>$1</a>").into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text: &str) -> Event {
        Event {
            urn: "urn:test:1".to_string(),
            title: "hello".to_string(),
            text: text.to_string(),
            rank: 1,
            time: Utc::now(),
        }
    }

    #[test]
    fn html_renders_links() {
        let e = event("see [issue #5](https://github.com/a/b/issues/5) now");
        assert_eq!(
            e.html(),
            "see <a href='https://github.com/a/b/issues/5'>issue #5</a> now"
        );
    }

    #[test]
    fn html_keeps_plain_text() {
        let e = event("nothing [here] (really)");
        assert_eq!(e.html(), "nothing [here] (really)");
    }
}
