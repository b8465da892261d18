use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use wring_core::config::GithubConfig;
use wring_core::{Base, Events, Vault};

use super::api::{GithubApi, GithubError};
use super::rest::RestGithub;
use super::scan::Mention;
use super::subject::Subject;
use super::thread::{self, ThreadError};
use crate::agent::{Agent, AgentError, RunLog};

/// Turns GitHub mentions of the token's owner into events.
pub struct GithubAgent {
    api: Arc<dyn GithubApi>,
    vault: Arc<dyn Vault>,
    window: Duration,
}

/// Constructor registered under the `github` kind.
pub fn from_json(
    config: &GithubConfig,
    base: Arc<dyn Base>,
    json: &Value,
) -> Result<GithubAgent, AgentError> {
    let token = json
        .get("token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            AgentError::Config(
                "Your JSON object must contain non-empty \"token\" attribute with a GitHub access token"
                    .to_string(),
            )
        })?;
    let api = RestGithub::new(&config.api_url, token);
    Ok(GithubAgent::new(Arc::new(api), base.vault(), config.window()))
}

impl GithubAgent {
    pub fn new(api: Arc<dyn GithubApi>, vault: Arc<dyn Vault>, window: Duration) -> Self {
        Self { api, vault, window }
    }
}

#[async_trait]
impl Agent for GithubAgent {
    fn name(&self) -> &str {
        "github"
    }

    async fn push(&self, events: &dyn Events, log: &mut RunLog) -> Result<String, AgentError> {
        let since = Utc::now()
            - chrono::Duration::from_std(self.window).map_err(AgentError::internal)?;
        let login = self.api.self_login().await?;
        let mention = Mention::new(&login).map_err(AgentError::internal)?;
        let notifications = self.api.notifications(since).await?;
        debug!(login = %login, total = notifications.len(), "notifications listed");

        let mut accepted = 0;
        let mut subjects = 0;
        let mut failures = Vec::new();
        for notification in notifications.iter().filter(|n| n.reason == "mention") {
            let subject = match Subject::parse(notification) {
                Ok(Some(subject)) => subject,
                Ok(None) => {
                    info!(
                        kind = %notification.subject.kind,
                        repo = %notification.repository.full_name,
                        "subject type has no comments to scan"
                    );
                    continue;
                }
                Err(e) => {
                    failures.push(format!("{}: {e}", notification.repository.full_name));
                    continue;
                }
            };
            match thread::push(
                self.api.as_ref(),
                self.vault.as_ref(),
                events,
                &subject,
                &mention,
            )
            .await
            {
                Ok(n) => {
                    subjects += 1;
                    accepted += n;
                }
                Err(ThreadError::Github(GithubError::NotFound(url))) => {
                    log.warn(format!(
                        "{} is gone, its mention of @{login} was skipped ({url})",
                        subject.key()
                    ));
                }
                Err(ThreadError::Github(GithubError::Unauthorized(reason))) => {
                    return Err(GithubError::Unauthorized(reason).into());
                }
                Err(e) => {
                    warn!(subject = %subject.key(), error = %e, "subject failed");
                    failures.push(format!("{}: {e}", subject.key()));
                }
            }
        }

        if !failures.is_empty() {
            return Err(anyhow::anyhow!(
                "{} subject(s) failed, notifications left unread: {}",
                failures.len(),
                failures.join("; ")
            )
            .into());
        }
        self.api.mark_read(since).await?;
        Ok(format!(
            "{accepted} mention(s) in {subjects} subject(s) of @{login}"
        ))
    }
}
