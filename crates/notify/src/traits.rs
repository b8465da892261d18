//! Notifier trait definition and shared error types.

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

/// Trait for chat channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text` to the chat with this id.
    async fn send(&self, chat: &str, text: &str) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "telegram").
    fn channel_name(&self) -> &str;
}

/// Notifier that delivers nothing, used when no bot is configured.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait::async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, chat: &str, _text: &str) -> Result<(), NotifyError> {
        tracing::debug!(chat, "no chat channel configured, message dropped");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_notifier_accepts_everything() {
        let notifier = NullNotifier;
        assert!(notifier.send("-100", "hello").await.is_ok());
        assert_eq!(notifier.channel_name(), "null");
    }
}
