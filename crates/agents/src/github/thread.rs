use tracing::info;
use wring_core::html::printable;
use wring_core::{Events, Vault, WringError};

use super::api::{GithubApi, GithubError};
use super::scan::{scan, Mention};
use super::subject::Subject;

/// Why one subject could not be processed.
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error(transparent)]
    Github(#[from] GithubError),

    #[error(transparent)]
    Store(#[from] WringError),

    #[error("Cursor \"{key}\" holds \"{value}\", not a comment id")]
    Cursor { key: String, value: String },
}

/// Scan one subject's comments past its cursor and post what mentions us.
///
/// Everything the event needs is fetched first. The cursor is then written
/// back before posting, whether anything matched or not, so a failed fetch
/// leaves it where it was. Returns the number of comments accepted.
pub async fn push(
    api: &dyn GithubApi,
    vault: &dyn Vault,
    events: &dyn Events,
    subject: &Subject,
    mention: &Mention,
) -> Result<usize, ThreadError> {
    let key = subject.key();
    let cursor = match vault.get(&key).await? {
        Some(value) => match value.trim().parse::<u64>() {
            Ok(seen) => seen,
            Err(_) => return Err(ThreadError::Cursor { key, value }),
        },
        None => 0,
    };
    let comments = match subject {
        Subject::Issue { coords, number } => api.issue_comments(coords, *number).await?,
        Subject::Commit { coords, sha } => api.commit_comments(coords, sha).await?,
    };
    let result = scan(&comments, cursor, mention);
    let title = if result.body.is_empty() {
        None
    } else {
        Some(match subject {
            Subject::Issue { coords, number } => {
                let issue = api.issue(coords, *number).await?;
                format!("[{coords}#{number}] {}", issue.title)
            }
            Subject::Commit { coords, sha } => format!("[{coords}] {sha}"),
        })
    };
    vault.set(&key, &result.seen.to_string()).await?;
    info!(subject = %key, from = cursor, to = result.seen, "cursor advanced");

    let Some(title) = title else {
        info!(subject = %key, "nothing mentions @{}", mention.login());
        return Ok(0);
    };
    events.post(&title, &result.body).await?;
    info!(
        subject = %key,
        accepted = result.accepted,
        "event posted: {}",
        printable(&title)
    );
    Ok(result.accepted)
}
