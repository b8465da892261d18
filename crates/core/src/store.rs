//! Repository-style interfaces to the long-term store.
//!
//! The engine only ever talks to these traits. A DynamoDB (or any other
//! item store) backend lives outside this workspace; [`crate::memory`]
//! provides the in-process implementation used by tests and the worker
//! binary.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WringError;
use crate::model::{Event, Pipe, PipeId};

/// Append-only per-user event log.
#[async_trait]
pub trait Events: Send + Sync {
    /// Create an event, or merge `text` into the existing one with the same title.
    ///
    /// Stores always return `Some`. A filter wrapping a store returns `None`
    /// when it suppressed the post.
    async fn post(&self, title: &str, text: &str) -> Result<Option<Event>, WringError>;

    /// Find an event by title, failing with [`WringError::EventNotFound`].
    async fn find(&self, title: &str) -> Result<Event, WringError>;

    /// Adjust the rank of an event by `delta`.
    async fn vote(&self, title: &str, delta: i64) -> Result<(), WringError>;

    /// Delete an event.
    async fn delete(&self, title: &str) -> Result<(), WringError>;

    /// Top events by rank (at most 20), highest first.
    async fn iterate(&self) -> Result<Vec<Event>, WringError>;
}

/// Pipes of a single user.
#[async_trait]
pub trait Pipes: Send + Sync {
    async fn iterate(&self) -> Result<Vec<Pipe>, WringError>;

    /// Add a new pipe with the given JSON configuration.
    async fn add(&self, json: &str) -> Result<Pipe, WringError>;

    async fn pipe(&self, id: PipeId) -> Result<Pipe, WringError>;

    async fn set_status(&self, id: PipeId, status: &str) -> Result<(), WringError>;

    async fn delete(&self, id: PipeId) -> Result<(), WringError>;
}

/// Key-value persistence for "last processed" markers.
#[async_trait]
pub trait Vault: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, WringError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), WringError>;
}

/// Resources of one user.
pub struct User {
    pub urn: String,
    pub events: Arc<dyn Events>,
    pub pipes: Arc<dyn Pipes>,
}

/// Entry point to the whole store.
#[async_trait]
pub trait Base: Send + Sync {
    /// Resources of the user with this URN.
    fn user(&self, urn: &str) -> User;

    /// Snapshot of all pipes of all users.
    async fn pipes(&self) -> Result<Vec<Pipe>, WringError>;

    /// The cursor store.
    fn vault(&self) -> Arc<dyn Vault>;
}
