//! In-memory store backed by `tokio::sync::RwLock` maps.
//!
//! Every handle returned by [`MemoryBase`] shares the same tables, so a
//! pipe status written through one user's [`MemoryPipes`] is visible in the
//! next [`Base::pipes`] snapshot.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::WringError;
use crate::model::{Event, Pipe, PipeId};
use crate::store::{Base, Events, Pipes, User, Vault};

/// Maximum events returned by [`Events::iterate`].
const TOP_EVENTS: usize = 20;

type EventTable = RwLock<HashMap<(String, String), Event>>;

#[derive(Default)]
struct PipeTable {
    rows: RwLock<BTreeMap<PipeId, Pipe>>,
    next: AtomicU64,
}

/// Seed record in a pipes file.
#[derive(Debug, Deserialize)]
struct PipeSeed {
    urn: String,
    json: serde_json::Value,
}

/// The whole store, held in process memory.
#[derive(Clone, Default)]
pub struct MemoryBase {
    events: Arc<EventTable>,
    pipes: Arc<PipeTable>,
    vault: Arc<MemoryVault>,
}

impl MemoryBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add pipes from a JSON file shaped as `[{"urn": "...", "json": {...}}]`.
    ///
    /// `json` may be an object or a string holding the raw configuration.
    /// Returns the number of pipes added.
    pub async fn load_pipes(&self, path: &Path) -> Result<usize, WringError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let seeds: Vec<PipeSeed> = serde_json::from_str(&raw)?;
        let count = seeds.len();
        for seed in seeds {
            let json = match seed.json {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            self.user(&seed.urn).pipes.add(&json).await?;
        }
        info!(path = %path.display(), count, "pipes loaded");
        Ok(count)
    }

    /// Concrete event handle for a user, for callers that need the memory type.
    pub fn events(&self, urn: &str) -> MemoryEvents {
        MemoryEvents {
            urn: urn.to_string(),
            table: Arc::clone(&self.events),
        }
    }

    /// Concrete pipes handle for a user.
    pub fn user_pipes(&self, urn: &str) -> MemoryPipes {
        MemoryPipes {
            urn: urn.to_string(),
            table: Arc::clone(&self.pipes),
        }
    }

    /// Concrete vault handle.
    pub fn memory_vault(&self) -> Arc<MemoryVault> {
        Arc::clone(&self.vault)
    }
}

#[async_trait]
impl Base for MemoryBase {
    fn user(&self, urn: &str) -> User {
        User {
            urn: urn.to_string(),
            events: Arc::new(self.events(urn)),
            pipes: Arc::new(self.user_pipes(urn)),
        }
    }

    async fn pipes(&self) -> Result<Vec<Pipe>, WringError> {
        let rows = self.pipes.rows.read().await;
        Ok(rows.values().cloned().collect())
    }

    fn vault(&self) -> Arc<dyn Vault> {
        self.vault.clone()
    }
}

/// Events of one user.
#[derive(Clone)]
pub struct MemoryEvents {
    urn: String,
    table: Arc<EventTable>,
}

impl MemoryEvents {
    /// Standalone event log, not attached to any [`MemoryBase`].
    pub fn new(urn: &str) -> Self {
        Self {
            urn: urn.to_string(),
            table: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn key(&self, title: &str) -> (String, String) {
        (self.urn.clone(), title.to_string())
    }

    /// Number of events this user has.
    pub async fn len(&self) -> usize {
        let table = self.table.read().await;
        table.keys().filter(|(urn, _)| *urn == self.urn).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Events for MemoryEvents {
    async fn post(&self, title: &str, text: &str) -> Result<Option<Event>, WringError> {
        let mut table = self.table.write().await;
        let event = table
            .entry(self.key(title))
            .and_modify(|e| {
                e.text = format!("{}\n\n{}", e.text, text);
                e.time = Utc::now();
            })
            .or_insert_with(|| Event {
                urn: self.urn.clone(),
                title: title.to_string(),
                text: text.to_string(),
                rank: 1,
                time: Utc::now(),
            });
        debug!(urn = %self.urn, title, rank = event.rank, "event posted");
        Ok(Some(event.clone()))
    }

    async fn find(&self, title: &str) -> Result<Event, WringError> {
        let table = self.table.read().await;
        table
            .get(&self.key(title))
            .cloned()
            .ok_or_else(|| WringError::EventNotFound(title.to_string()))
    }

    async fn vote(&self, title: &str, delta: i64) -> Result<(), WringError> {
        let mut table = self.table.write().await;
        let event = table
            .get_mut(&self.key(title))
            .ok_or_else(|| WringError::EventNotFound(title.to_string()))?;
        event.rank += delta;
        Ok(())
    }

    async fn delete(&self, title: &str) -> Result<(), WringError> {
        let mut table = self.table.write().await;
        table
            .remove(&self.key(title))
            .map(|_| ())
            .ok_or_else(|| WringError::EventNotFound(title.to_string()))
    }

    async fn iterate(&self) -> Result<Vec<Event>, WringError> {
        let table = self.table.read().await;
        let mut events: Vec<Event> = table
            .values()
            .filter(|e| e.urn == self.urn)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.rank.cmp(&a.rank).then(b.time.cmp(&a.time)));
        events.truncate(TOP_EVENTS);
        Ok(events)
    }
}

/// Pipes of one user.
#[derive(Clone)]
pub struct MemoryPipes {
    urn: String,
    table: Arc<PipeTable>,
}

impl MemoryPipes {
    async fn own(&self, id: PipeId) -> Result<Pipe, WringError> {
        let rows = self.table.rows.read().await;
        rows.get(&id)
            .filter(|p| p.urn == self.urn)
            .cloned()
            .ok_or(WringError::PipeNotFound(id))
    }
}

#[async_trait]
impl Pipes for MemoryPipes {
    async fn iterate(&self) -> Result<Vec<Pipe>, WringError> {
        let rows = self.table.rows.read().await;
        Ok(rows.values().filter(|p| p.urn == self.urn).cloned().collect())
    }

    async fn add(&self, json: &str) -> Result<Pipe, WringError> {
        let id = self.table.next.fetch_add(1, Ordering::Relaxed) + 1;
        let pipe = Pipe {
            id,
            urn: self.urn.clone(),
            json: json.to_string(),
            status: String::new(),
            created: Utc::now(),
        };
        self.table.rows.write().await.insert(id, pipe.clone());
        debug!(urn = %self.urn, id, "pipe added");
        Ok(pipe)
    }

    async fn pipe(&self, id: PipeId) -> Result<Pipe, WringError> {
        self.own(id).await
    }

    async fn set_status(&self, id: PipeId, status: &str) -> Result<(), WringError> {
        let mut rows = self.table.rows.write().await;
        let pipe = rows
            .get_mut(&id)
            .filter(|p| p.urn == self.urn)
            .ok_or(WringError::PipeNotFound(id))?;
        pipe.status = status.to_string();
        Ok(())
    }

    async fn delete(&self, id: PipeId) -> Result<(), WringError> {
        self.own(id).await?;
        self.table.rows.write().await.remove(&id);
        Ok(())
    }
}

/// Cursor store.
#[derive(Default)]
pub struct MemoryVault {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn get(&self, key: &str) -> Result<Option<String>, WringError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), WringError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn post_merges_by_title() {
        let events = MemoryEvents::new("urn:test:1");
        events.post("title", "first").await.unwrap();
        let merged = events.post("title", "second").await.unwrap().unwrap();
        assert_eq!(merged.text, "first\n\nsecond");
        assert_eq!(merged.rank, 1);
        assert_eq!(events.len().await, 1);
    }

    #[tokio::test]
    async fn vote_adjusts_rank() {
        let events = MemoryEvents::new("urn:test:1");
        events.post("t", "x").await.unwrap();
        events.vote("t", 5).await.unwrap();
        assert_eq!(events.find("t").await.unwrap().rank, 6);
    }

    #[tokio::test]
    async fn find_missing_event_fails() {
        let events = MemoryEvents::new("urn:test:1");
        let err = events.find("nope").await.unwrap_err();
        assert!(matches!(err, WringError::EventNotFound(_)));
    }

    #[tokio::test]
    async fn iterate_orders_by_rank() {
        let events = MemoryEvents::new("urn:test:1");
        events.post("low", "x").await.unwrap();
        events.post("high", "y").await.unwrap();
        events.vote("high", 3).await.unwrap();
        let top = events.iterate().await.unwrap();
        assert_eq!(top[0].title, "high");
        assert_eq!(top[1].title, "low");
    }

    #[tokio::test]
    async fn users_do_not_see_each_other() {
        let base = MemoryBase::new();
        base.events("urn:a").post("t", "x").await.unwrap();
        assert!(base.events("urn:b").is_empty().await);
        assert!(base.events("urn:b").find("t").await.is_err());
    }

    #[tokio::test]
    async fn status_is_visible_in_snapshot() {
        let base = MemoryBase::new();
        let pipes = base.user("urn:a").pipes;
        let pipe = pipes.add("{}").await.unwrap();
        pipes.set_status(pipe.id, "done").await.unwrap();
        let all = base.pipes().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, "done");
    }

    #[tokio::test]
    async fn foreign_pipe_cannot_be_touched() {
        let base = MemoryBase::new();
        let pipe = base.user("urn:a").pipes.add("{}").await.unwrap();
        let other = base.user("urn:b").pipes;
        assert!(other.set_status(pipe.id, "x").await.is_err());
        assert!(other.delete(pipe.id).await.is_err());
        base.user("urn:a").pipes.delete(pipe.id).await.unwrap();
        assert!(base.pipes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn vault_overwrites_in_place() {
        let vault = MemoryVault::new();
        assert_eq!(vault.get("a/b#1").await.unwrap(), None);
        vault.set("a/b#1", "3").await.unwrap();
        vault.set("a/b#1", "7").await.unwrap();
        assert_eq!(vault.get("a/b#1").await.unwrap().as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn loads_pipes_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"urn": "urn:a", "json": {{"kind": "github"}}}},
               {{"urn": "urn:b", "json": "{{\"kind\": \"x\"}}"}}]"#
        )
        .unwrap();
        let base = MemoryBase::new();
        let count = base.load_pipes(file.path()).await.unwrap();
        assert_eq!(count, 2);
        let all = base.pipes().await.unwrap();
        assert_eq!(all[0].urn, "urn:a");
        assert_eq!(all[0].json, r#"{"kind":"github"}"#);
        assert_eq!(all[1].json, r#"{"kind": "x"}"#);
    }
}
