//! Outbound chat delivery for events.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable chat channels
//! - Telegram Bot API notifier and a chat-id responder for the same bot
//! - `NullNotifier` for deployments without a bot token

pub mod telegram;
pub mod traits;

pub use telegram::{ChatIdResponder, TelegramNotifier};
pub use traits::{Notifier, NotifyError, NullNotifier};
