//! Notification channel for booking confirmations.
//!
//! Delivery is best-effort: [`notify_best_effort`] logs failures and never returns them.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::{num::NonZeroU64, sync::Arc};
use tracing::{debug, warn};

/// Sends a text message to a linked chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers `message` to `chat_id`.
    async fn notify(&self, chat_id: &str, message: &str) -> Result<()>;
}

/// Sends `message` and swallows any failure after logging it.
pub async fn notify_best_effort(notifier: &dyn Notifier, chat_id: &str, message: &str) {
    if let Err(e) = notifier.notify(chat_id, message).await {
        warn!(chat_id, error = %e, "Notification delivery failed");
    }
}

/// Delivers notifications as Discord direct messages.
pub struct DiscordNotifier {
    http: Arc<serenity::Http>,
}

impl DiscordNotifier {
    /// Uses the bot's HTTP client.
    #[must_use]
    pub const fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, chat_id: &str, message: &str) -> Result<()> {
        let user_id = chat_id
            .parse::<NonZeroU64>()
            .map_err(|_| Error::validation("chat_id", "chat id must be a non-zero number"))?;
        let channel = serenity::UserId::new(user_id.get())
            .create_dm_channel(&*self.http)
            .await?;
        channel.id.say(&self.http, message).await?;
        debug!(chat_id, "Notification delivered");
        Ok(())
    }
}

/// Drops every notification. Used when no chat client is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, chat_id: &str, _message: &str) -> Result<()> {
        debug!(chat_id, "Notification skipped, no channel configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discord() -> DiscordNotifier {
        DiscordNotifier::new(Arc::new(serenity::Http::new("token")))
    }

    #[tokio::test]
    async fn test_malformed_chat_ids_fail_without_sending() {
        for chat_id in ["0", "", "abc", "-5"] {
            let result = discord().notify(chat_id, "hi").await;
            assert!(
                matches!(result, Err(Error::Validation { ref field, .. }) if field == "chat_id"),
                "{chat_id:?} was accepted"
            );
        }
    }

    #[tokio::test]
    async fn test_best_effort_swallows_zero_chat_id() {
        notify_best_effort(&discord(), "0", "hi").await;
    }
}
