//! Cursor-based scanning of a comment thread for mentions.

use regex::Regex;
use wring_core::html::escape_html;

use super::api::Comment;

/// Matches `@login` not glued to other login characters.
#[derive(Debug, Clone)]
pub struct Mention {
    login: String,
    regex: Regex,
}

impl Mention {
    pub fn new(login: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(
            "(?i)(?:^|[^a-z0-9-])@{}(?:[^a-z0-9-]|$)",
            regex::escape(login)
        ))?;
        Ok(Self {
            login: login.to_string(),
            regex,
        })
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn is_in(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// GitHub logins are case-insensitive.
    pub fn is_author(&self, comment: &Comment) -> bool {
        comment.user.login.eq_ignore_ascii_case(&self.login)
    }
}

/// Outcome of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    /// New cursor value, never below the one scanned from.
    pub seen: u64,
    /// Accumulated excerpts, empty when nothing mentioned us.
    pub body: String,
    pub accepted: usize,
}

/// Walk `comments` in ascending id order past `cursor`.
///
/// Every comment above the cursor advances it, whether it matched,
/// did not match, or was written by `mention`'s own login. Only comments by
/// others that mention the login contribute to the body.
pub fn scan(comments: &[Comment], cursor: u64, mention: &Mention) -> Scan {
    let mut fresh: Vec<&Comment> = comments.iter().filter(|c| c.id > cursor).collect();
    fresh.sort_by_key(|c| c.id);
    let mut result = Scan {
        seen: cursor,
        body: String::new(),
        accepted: 0,
    };
    for comment in fresh {
        result.seen = comment.id;
        if mention.is_author(comment) {
            continue;
        }
        if mention.is_in(&comment.body) {
            result.body.push_str(&excerpt(comment));
            result.accepted += 1;
        }
    }
    result
}

fn excerpt(comment: &Comment) -> String {
    format!(
        "@{} at [{}]({}): {}\n\n",
        comment.user.login,
        comment.created_at.format("%-d-%b-%Y"),
        comment.html_url,
        escape_html(&comment.body)
    )
}
