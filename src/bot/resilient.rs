//! Telegram calls with automatic retry on transient failures.
//!
//! Edits treat "message is not modified" and "message to edit not found"
//! as expected outcomes rather than errors, so they are never retried.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, Message, MessageId};
use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

/// Telegram limit for message text
const MESSAGE_LIMIT_CHARS: usize = 4096;

/// Result of a best-effort edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The message now shows the new text
    Edited,
    /// Telegram reported the text was already there
    NotModified,
    /// The message is gone or the edit failed after retries
    Failed,
}

/// Send a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let text = crate::utils::truncate_str(text.into(), MESSAGE_LIMIT_CHARS);
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(markup) = markup.clone() {
            req = req.reply_markup(markup);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit a message with retry, swallowing the expected failures.
pub async fn edit_message_safe_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
    markup: Option<InlineKeyboardMarkup>,
) -> EditOutcome {
    let text = crate::utils::truncate_str(text, MESSAGE_LIMIT_CHARS);
    let result = crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.edit_message_text(chat_id, msg_id, text.clone());
        if let Some(markup) = markup.clone() {
            req = req.reply_markup(markup);
        }
        match req.await {
            Ok(_) => Ok(EditOutcome::Edited),
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(EditOutcome::NotModified),
            Err(RequestError::Api(ApiError::MessageToEditNotFound)) => {
                debug!(chat_id = chat_id.0, msg_id = msg_id.0, "Message to edit is gone");
                Ok(EditOutcome::Failed)
            }
            Err(e) => Err(anyhow::anyhow!("Telegram edit error: {e}")),
        }
    })
    .await;

    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Failed to edit message after retries: {e}");
            EditOutcome::Failed
        }
    }
}

/// Single edit attempt for frequent progress updates; errors are logged
/// at debug and dropped.
pub async fn edit_message_best_effort(bot: &Bot, chat_id: ChatId, msg_id: MessageId, text: &str) {
    if let Err(e) = bot.edit_message_text(chat_id, msg_id, text).await {
        debug!(chat_id = chat_id.0, msg_id = msg_id.0, "Progress edit skipped: {e}");
    }
}

/// Delete a message with retry; a message that is already gone counts as
/// deleted.
pub async fn delete_message_resilient(bot: &Bot, chat_id: ChatId, msg_id: MessageId) {
    let result = crate::utils::retry_telegram_operation(|| async {
        match bot.delete_message(chat_id, msg_id).await {
            Ok(_) | Err(RequestError::Api(ApiError::MessageToDeleteNotFound)) => Ok(()),
            Err(e) => Err(anyhow::anyhow!("Telegram delete error: {e}")),
        }
    })
    .await;
    if let Err(e) = result {
        warn!(chat_id = chat_id.0, msg_id = msg_id.0, "Could not delete message: {e}");
    }
}
