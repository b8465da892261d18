//! Where unexpected failures are reported for operators.

use std::sync::Mutex;

use tracing::error;

/// Receives unexpected errors from agent runs and the scheduler.
pub trait ErrorTracker: Send + Sync {
    fn capture(&self, context: &str, error: &(dyn std::error::Error + 'static));
}

/// Reports through `tracing` at error level, with the full source chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracker;

impl ErrorTracker for LogTracker {
    fn capture(&self, context: &str, err: &(dyn std::error::Error + 'static)) {
        error!(context, error = %chain(err), "captured error");
    }
}

/// Keeps captures in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    captured: Mutex<Vec<String>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capture so far, as `"context: message"`.
    pub fn captured(&self) -> Vec<String> {
        self.captured
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl ErrorTracker for MemoryTracker {
    fn capture(&self, context: &str, err: &(dyn std::error::Error + 'static)) {
        if let Ok(mut captured) = self.captured.lock() {
            captured.push(format!("{context}: {}", chain(err)));
        }
    }
}

/// `outer: inner: root` rendering of an error and its sources.
fn chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
