//! Event filters built from a pipe's `ignore`, `boost`, and `notify` fields.
//!
//! Each [`Filtered`] wraps another [`Events`] and is itself an [`Events`].
//! [`wrap`] always composes them in the same order:
//!
//! ```text
//! agent -> ignore -> boost -> notify -> user's event log
//! ```
//!
//! so an ignored post is never boosted nor sent to chat, and a boosted post
//! reaches chat exactly once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};
use wring_core::html::printable;
use wring_core::{Event, Events, WringError};
use wring_notify::Notifier;

use crate::agent::AgentError;
use crate::pattern::Patterns;

/// Rank added to an event matching a boost pattern.
pub const BOOST: i64 = 5;

/// Upper bound on a chat delivery attempt.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// One transformation of outgoing posts.
pub enum Filter {
    /// Drop posts whose text matches.
    Ignore(Patterns),
    /// Raise the rank of posts whose title or text matches.
    Boost(Patterns),
    /// Mirror every post to a chat, best-effort.
    Notify {
        chat: String,
        notifier: Arc<dyn Notifier>,
    },
}

/// An event log seen through one [`Filter`].
pub struct Filtered {
    filter: Filter,
    origin: Arc<dyn Events>,
}

impl Filtered {
    pub fn new(filter: Filter, origin: Arc<dyn Events>) -> Self {
        Self { filter, origin }
    }
}

#[async_trait]
impl Events for Filtered {
    async fn post(&self, title: &str, text: &str) -> Result<Option<Event>, WringError> {
        match &self.filter {
            Filter::Ignore(patterns) => {
                if let Some(p) = patterns.find(text) {
                    info!(
                        pattern = p.source(),
                        "ignoring \"{}\"",
                        printable(text)
                    );
                    return Ok(None);
                }
                self.origin.post(title, text).await
            }
            Filter::Boost(patterns) => {
                let posted = self.origin.post(title, text).await?;
                let hit = patterns.find(text).or_else(|| patterns.find(title));
                match (posted, hit) {
                    (Some(_), Some(p)) => {
                        self.origin.vote(title, BOOST).await?;
                        info!(
                            pattern = p.source(),
                            "boosting \"{}\"",
                            printable(text)
                        );
                        self.origin.find(title).await.map(Some)
                    }
                    (posted, _) => Ok(posted),
                }
            }
            Filter::Notify { chat, notifier } => {
                let message = format!("{title}\n\n{text}");
                match tokio::time::timeout(NOTIFY_TIMEOUT, notifier.send(chat, &message)).await {
                    Ok(Ok(())) => debug!(chat = %chat, channel = notifier.channel_name(), "event mirrored"),
                    Ok(Err(e)) => warn!(chat = %chat, error = %e, "chat delivery failed"),
                    Err(_) => warn!(chat = %chat, "chat delivery timed out"),
                }
                self.origin.post(title, text).await
            }
        }
    }

    async fn find(&self, title: &str) -> Result<Event, WringError> {
        self.origin.find(title).await
    }

    async fn vote(&self, title: &str, delta: i64) -> Result<(), WringError> {
        self.origin.vote(title, delta).await
    }

    async fn delete(&self, title: &str) -> Result<(), WringError> {
        self.origin.delete(title).await
    }

    async fn iterate(&self) -> Result<Vec<Event>, WringError> {
        self.origin.iterate().await
    }
}

/// Chat id from `notify`, falling back to the older `telegram` field.
fn chat_of(json: &Value) -> Result<Option<String>, AgentError> {
    let value = json.get("notify").or_else(|| json.get("telegram"));
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(AgentError::Config(format!(
            "\"notify\" must be a chat id, not {other}"
        ))),
    }
}

/// Wrap `sink` with the filters the pipe JSON asks for.
///
/// Patterns are compiled here, once per run.
pub fn wrap(
    sink: Arc<dyn Events>,
    json: &Value,
    notifier: Arc<dyn Notifier>,
) -> Result<Arc<dyn Events>, AgentError> {
    let ignore = Patterns::from_json(json, "ignore")?;
    let boost = Patterns::from_json(json, "boost")?;
    let chat = chat_of(json)?;

    let mut events = sink;
    if let Some(chat) = chat {
        events = Arc::new(Filtered::new(Filter::Notify { chat, notifier }, events));
    }
    if !boost.is_empty() {
        events = Arc::new(Filtered::new(Filter::Boost(boost), events));
    }
    if !ignore.is_empty() {
        events = Arc::new(Filtered::new(Filter::Ignore(ignore), events));
    }
    Ok(events)
}
