//! The [`Agent`] trait, its error taxonomy, and the per-run log buffer.

use async_trait::async_trait;
use wring_core::{Events, WringError};

/// Concrete polling logic selected by a pipe's `kind`.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Short name, shown in the title of the run summary event.
    fn name(&self) -> &str;

    /// Push new events, returning a short status for the pipe.
    ///
    /// Lines written to `log` end up in the run summary event; a run that
    /// leaves `log` empty posts nothing.
    async fn push(&self, events: &dyn Events, log: &mut RunLog) -> Result<String, AgentError>;
}

/// Why an agent run failed.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The pipe configuration is broken (bad JSON shape, unknown kind).
    #[error("{0}")]
    Config(String),

    /// The agent declares a problem with its own inputs (e.g. bad credentials).
    #[error("{0}")]
    User(String),

    /// Anything unexpected.
    #[error("{error}")]
    Internal {
        /// Type name of the original error.
        kind: &'static str,
        error: anyhow::Error,
    },
}

impl AgentError {
    /// Wrap any error as internal, remembering its type name.
    pub fn internal<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            kind: std::any::type_name::<E>(),
            error: anyhow::Error::new(error),
        }
    }

    /// Status string written to the pipe when a run fails this way.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config-error",
            Self::User(_) => "user-error",
            Self::Internal { .. } => "internal-error",
        }
    }

    /// Whether the failure is the user's to fix.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal {
            kind: "anyhow::Error",
            error,
        }
    }
}

impl From<WringError> for AgentError {
    fn from(error: WringError) -> Self {
        Self::internal(error)
    }
}

/// Log lines an agent wants the user to see.
///
/// Every line is also emitted through `tracing`, so operators see the same
/// output in the process log.
#[derive(Debug, Default)]
pub struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "wring::agent", "{}", message);
        self.lines.push(format!("INFO {message}"));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "wring::agent", "{}", message);
        self.lines.push(format!("WARN {message}"));
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// All lines, newline-separated.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}
