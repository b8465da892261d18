use super::api::{Coordinates, GithubError, Notification};

/// The GitHub entity a mention notification is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// Issues and pull requests share one comment thread API.
    Issue { coords: Coordinates, number: u64 },
    Commit { coords: Coordinates, sha: String },
}

impl Subject {
    /// Resolve a notification, or `Ok(None)` for subject types that carry
    /// no comments to scan (releases, discussions, alerts).
    pub fn parse(notification: &Notification) -> Result<Option<Self>, GithubError> {
        let coords: Coordinates = notification.repository.full_name.parse()?;
        let kind = notification.subject.kind.as_str();
        if !matches!(kind, "Issue" | "PullRequest" | "Commit") {
            return Ok(None);
        }
        let url = notification.subject.url.as_deref().unwrap_or_default();
        let tail = url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GithubError::Parse(format!("{kind} subject without URL in {coords}")))?;
        let subject = if kind == "Commit" {
            Self::Commit {
                coords,
                sha: tail.to_string(),
            }
        } else {
            let number = tail
                .parse()
                .map_err(|_| GithubError::Parse(format!("bad {kind} number in {url}")))?;
            Self::Issue { coords, number }
        };
        Ok(Some(subject))
    }

    /// Vault key of this subject's cursor.
    pub fn key(&self) -> String {
        match self {
            Self::Issue { coords, number } => format!("{coords}#{number}"),
            Self::Commit { coords, sha } => format!("{coords}#{sha}"),
        }
    }
}
