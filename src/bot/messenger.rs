//! Chat operations used by handlers and jobs, behind a trait so the
//! status lifecycle can run against a mock.

use super::resilient::{
    delete_message_resilient, edit_message_best_effort, edit_message_safe_resilient,
    send_message_resilient, EditOutcome,
};
use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};

/// Sends, edits and deletes chat messages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends a message with retry and returns its id.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted.
    async fn send(
        &self,
        chat_id: ChatId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId>;

    /// Edits a message with retry.
    async fn edit(
        &self,
        chat_id: ChatId,
        msg_id: MessageId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    ) -> EditOutcome;

    /// Single-attempt edit for status updates.
    async fn edit_status(&self, chat_id: ChatId, msg_id: MessageId, text: String);

    /// Deletes a message with retry; failures are logged.
    async fn delete(&self, chat_id: ChatId, msg_id: MessageId);
}

/// [`Messenger`] over the cloud Bot API
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(
        &self,
        chat_id: ChatId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        let msg = send_message_resilient(&self.bot, chat_id, text, markup).await?;
        Ok(msg.id)
    }

    async fn edit(
        &self,
        chat_id: ChatId,
        msg_id: MessageId,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    ) -> EditOutcome {
        edit_message_safe_resilient(&self.bot, chat_id, msg_id, &text, markup).await
    }

    async fn edit_status(&self, chat_id: ChatId, msg_id: MessageId, text: String) {
        edit_message_best_effort(&self.bot, chat_id, msg_id, &text).await;
    }

    async fn delete(&self, chat_id: ChatId, msg_id: MessageId) {
        delete_message_resilient(&self.bot, chat_id, msg_id).await;
    }
}
