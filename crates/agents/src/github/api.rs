//! The slice of the GitHub REST API the mentions agent needs.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::agent::AgentError;

/// `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinates {
    pub owner: String,
    pub repo: String,
}

impl FromStr for Coordinates {
    type Err = GithubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(GithubError::Parse(format!("invalid repository name \"{s}\""))),
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub reason: String,
    pub repository: Repository,
    pub subject: SubjectRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

/// What a notification points at, before it is resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectRef {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    pub user: Author,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub login: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub rejected the credentials ({0})")]
    Unauthorized(String),

    #[error("GitHub rate limit exceeded at {0}")]
    RateLimited(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("GitHub returned HTTP {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("Unexpected GitHub response: {0}")]
    Parse(String),
}

impl From<GithubError> for AgentError {
    fn from(error: GithubError) -> Self {
        match error {
            GithubError::Unauthorized(_) => AgentError::User(format!(
                "{error}. Check the \"token\" of this pipe, it must be a valid GitHub token with the \"notifications\" scope."
            )),
            other => AgentError::internal(other),
        }
    }
}

/// GitHub operations, as seen by the mentions agent.
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Login of the token's owner.
    async fn self_login(&self) -> Result<String, GithubError>;

    /// Notifications the user participates in, updated after `since`,
    /// read ones included.
    async fn notifications(&self, since: DateTime<Utc>) -> Result<Vec<Notification>, GithubError>;

    async fn issue(&self, coords: &Coordinates, number: u64) -> Result<Issue, GithubError>;

    /// Comments of an issue or pull request, in the order GitHub returns them.
    async fn issue_comments(
        &self,
        coords: &Coordinates,
        number: u64,
    ) -> Result<Vec<Comment>, GithubError>;

    async fn commit_comments(
        &self,
        coords: &Coordinates,
        sha: &str,
    ) -> Result<Vec<Comment>, GithubError>;

    /// Mark every notification up to `last_read_at` as read.
    async fn mark_read(&self, last_read_at: DateTime<Utc>) -> Result<(), GithubError>;
}
