use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use wring_core::{Base, Pipe, WringError};
use wring_notify::Notifier;

use crate::exec::Exec;
use crate::filters;
use crate::registry::AgentRegistry;
use crate::tracker::ErrorTracker;

/// Event title used when the pipe JSON itself is unreadable.
const PARSE_FAILURE_TITLE: &str = "wring::cycle";

/// Turns a stored pipe into one agent run.
pub struct Cycle {
    base: Arc<dyn Base>,
    registry: Arc<AgentRegistry>,
    notifier: Arc<dyn Notifier>,
    tracker: Arc<dyn ErrorTracker>,
}

impl Cycle {
    pub fn new(
        base: Arc<dyn Base>,
        registry: Arc<AgentRegistry>,
        notifier: Arc<dyn Notifier>,
        tracker: Arc<dyn ErrorTracker>,
    ) -> Self {
        Self {
            base,
            registry,
            notifier,
            tracker,
        }
    }

    pub fn base(&self) -> &Arc<dyn Base> {
        &self.base
    }

    pub fn tracker(&self) -> &Arc<dyn ErrorTracker> {
        &self.tracker
    }

    /// Parse, resolve, filter, run.
    ///
    /// The JSON is re-read from `pipe` on every call; nothing is cached
    /// between runs.
    pub async fn exec(&self, pipe: &Pipe) -> Result<(), WringError> {
        let user = self.base.user(&pipe.urn);
        debug!(pipe = pipe.id, urn = %pipe.urn, "cycle started");

        let json: Value = match serde_json::from_str(&pipe.json) {
            Ok(json) => json,
            Err(e) => {
                warn!(pipe = pipe.id, error = %e, "pipe JSON is broken");
                let text = format!("Failed to parse JSON:\n{}\n\n{e}", pipe.json);
                let posted = user.events.post(PARSE_FAILURE_TITLE, &text).await;
                let written = user
                    .pipes
                    .set_status(pipe.id, "config-error")
                    .await;
                posted?;
                return written;
            }
        };

        let raw = Exec::new(
            user.events.clone(),
            user.pipes.clone(),
            pipe.id,
            self.tracker.clone(),
        );
        let events = match filters::wrap(user.events.clone(), &json, self.notifier.clone()) {
            Ok(events) => events,
            Err(e) => return raw.report(PARSE_FAILURE_TITLE, e).await,
        };
        let exec = Exec::new(events, user.pipes, pipe.id, self.tracker.clone());
        match self.registry.build(self.base.clone(), &json) {
            Ok(agent) => exec.run(agent.as_ref()).await,
            Err(e) => exec.report(PARSE_FAILURE_TITLE, e).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use wring_core::memory::MemoryBase;
    use wring_core::Events;
    use wring_notify::NullNotifier;

    use crate::agent::{Agent, AgentError, RunLog};
    use crate::exec::IDENTITY;
    use crate::tracker::MemoryTracker;

    /// Posts the configured text as an event.
    struct Poster {
        text: String,
    }

    #[async_trait]
    impl Agent for Poster {
        fn name(&self) -> &str {
            "poster"
        }
        async fn push(&self, events: &dyn Events, _: &mut RunLog) -> Result<String, AgentError> {
            events.post("posted", &self.text).await?;
            Ok("posted".to_string())
        }
    }

    fn cycle(base: &MemoryBase) -> Cycle {
        let mut registry = AgentRegistry::new();
        registry
            .register("poster", |_, json| {
                let text = json["text"].as_str().unwrap_or_default().to_string();
                Ok(Box::new(Poster { text }) as Box<dyn Agent>)
            })
            .unwrap();
        Cycle::new(
            Arc::new(base.clone()),
            Arc::new(registry),
            Arc::new(NullNotifier),
            Arc::new(MemoryTracker::new()),
        )
    }

    async fn run(json: &str) -> (MemoryBase, Pipe) {
        let base = MemoryBase::new();
        let pipe = base.user("urn:test:1").pipes.add(json).await.unwrap();
        cycle(&base).exec(&pipe).await.unwrap();
        let pipe = base.user("urn:test:1").pipes.pipe(pipe.id).await.unwrap();
        (base, pipe)
    }

    #[tokio::test]
    async fn broken_json_is_reported() {
        let (base, pipe) = run("{not json").await;
        assert_eq!(pipe.status, "config-error");
        let event = base.events("urn:test:1").find("wring::cycle").await.unwrap();
        assert!(event.text.starts_with("Failed to parse JSON:\n{not json\n\n"));
    }

    #[tokio::test]
    async fn unknown_kind_is_users_fault() {
        let (base, pipe) = run(r#"{"kind":"unknown-thing"}"#).await;
        assert_eq!(pipe.status, "config-error");
        let event = base
            .events("urn:test:1")
            .find(&format!("It's your fault by {IDENTITY}"))
            .await
            .unwrap();
        assert!(event.text.contains("must contain"));
    }

    #[tokio::test]
    async fn bad_pattern_is_users_fault() {
        let (_, pipe) = run(r#"{"kind":"poster","ignore":["/[bad/"]}"#).await;
        assert_eq!(pipe.status, "config-error");
    }

    #[tokio::test]
    async fn agent_posts_through_filters() {
        let (base, pipe) = run(r#"{"kind":"poster","text":"hello","boost":["hello"]}"#).await;
        assert_eq!(pipe.status, "posted");
        let event = base.events("urn:test:1").find("posted").await.unwrap();
        assert_eq!(event.rank, 1 + crate::filters::BOOST);
    }

    #[tokio::test]
    async fn ignored_post_leaves_no_event() {
        let (base, pipe) = run(r#"{"kind":"poster","text":"spam","ignore":"spam"}"#).await;
        assert_eq!(pipe.status, "posted");
        assert!(base.events("urn:test:1").is_empty().await);
    }
}
